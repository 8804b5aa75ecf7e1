//! Message type ids
//!
//! Every frame carries a numeric message type id. Requests and their
//! responses use adjacent ids; notifications are server-to-client only.

/// Message type ids known to the node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MsgId {
    /// Heartbeat request, also used as the server's presence probe
    HeartbeatReq = 1003,
    HeartbeatRsp = 1004,
    LoginReq = 1005,
    LoginRsp = 1006,
    SearchUserReq = 1007,
    SearchUserRsp = 1008,
    AddFriendReq = 1009,
    AddFriendRsp = 1010,
    NotifyAddFriend = 1011,
    AuthFriendReq = 1012,
    AuthFriendRsp = 1013,
    NotifyAuthFriend = 1014,
    LogoutReq = 1017,
    LogoutRsp = 1018,
    /// The session was replaced by a login elsewhere
    NotifyOffline = 1019,
    TextChatReq = 1020,
    TextChatRsp = 1021,
    /// Reliable, carries `seq`
    NotifyTextChat = 1022,
    CreateGroupReq = 1023,
    CreateGroupRsp = 1024,
    JoinGroupReq = 1025,
    JoinGroupRsp = 1026,
    NotifyJoinGroup = 1027,
    QuitGroupReq = 1028,
    QuitGroupRsp = 1029,
    NotifyQuitGroup = 1030,
    GroupTextReq = 1031,
    GroupTextRsp = 1032,
    /// Reliable, carries `seq`
    NotifyGroupText = 1033,
    GroupMembersReq = 1034,
    GroupMembersRsp = 1035,
    PeerTextReq = 0xf001,
    PeerTextRsp = 0xf002,
    PeerAddFriendReq = 0xf003,
    PeerAddFriendRsp = 0xf004,
    PeerAuthFriendReq = 0xf005,
    PeerAuthFriendRsp = 0xf006,
    PeerKickReq = 0xf007,
    PeerKickRsp = 0xf008,
    AckReq = 0xff33,
    AckRsp = 0xff34,
}

impl MsgId {
    /// Look up a raw id
    #[must_use]
    pub fn from_u32(value: u32) -> Option<Self> {
        let id = match value {
            1003 => Self::HeartbeatReq,
            1004 => Self::HeartbeatRsp,
            1005 => Self::LoginReq,
            1006 => Self::LoginRsp,
            1007 => Self::SearchUserReq,
            1008 => Self::SearchUserRsp,
            1009 => Self::AddFriendReq,
            1010 => Self::AddFriendRsp,
            1011 => Self::NotifyAddFriend,
            1012 => Self::AuthFriendReq,
            1013 => Self::AuthFriendRsp,
            1014 => Self::NotifyAuthFriend,
            1017 => Self::LogoutReq,
            1018 => Self::LogoutRsp,
            1019 => Self::NotifyOffline,
            1020 => Self::TextChatReq,
            1021 => Self::TextChatRsp,
            1022 => Self::NotifyTextChat,
            1023 => Self::CreateGroupReq,
            1024 => Self::CreateGroupRsp,
            1025 => Self::JoinGroupReq,
            1026 => Self::JoinGroupRsp,
            1027 => Self::NotifyJoinGroup,
            1028 => Self::QuitGroupReq,
            1029 => Self::QuitGroupRsp,
            1030 => Self::NotifyQuitGroup,
            1031 => Self::GroupTextReq,
            1032 => Self::GroupTextRsp,
            1033 => Self::NotifyGroupText,
            1034 => Self::GroupMembersReq,
            1035 => Self::GroupMembersRsp,
            0xf001 => Self::PeerTextReq,
            0xf002 => Self::PeerTextRsp,
            0xf003 => Self::PeerAddFriendReq,
            0xf004 => Self::PeerAddFriendRsp,
            0xf005 => Self::PeerAuthFriendReq,
            0xf006 => Self::PeerAuthFriendRsp,
            0xf007 => Self::PeerKickReq,
            0xf008 => Self::PeerKickRsp,
            0xff33 => Self::AckReq,
            0xff34 => Self::AckRsp,
            _ => return None,
        };
        Some(id)
    }

    /// Get the raw id
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// Check if this id is only exchanged between nodes
    #[must_use]
    pub const fn is_peer_only(self) -> bool {
        matches!(
            self,
            Self::PeerTextReq
                | Self::PeerTextRsp
                | Self::PeerAddFriendReq
                | Self::PeerAddFriendRsp
                | Self::PeerAuthFriendReq
                | Self::PeerAuthFriendRsp
                | Self::PeerKickReq
                | Self::PeerKickRsp
        )
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::HeartbeatReq => "HeartbeatReq",
            Self::HeartbeatRsp => "HeartbeatRsp",
            Self::LoginReq => "LoginReq",
            Self::LoginRsp => "LoginRsp",
            Self::SearchUserReq => "SearchUserReq",
            Self::SearchUserRsp => "SearchUserRsp",
            Self::AddFriendReq => "AddFriendReq",
            Self::AddFriendRsp => "AddFriendRsp",
            Self::NotifyAddFriend => "NotifyAddFriend",
            Self::AuthFriendReq => "AuthFriendReq",
            Self::AuthFriendRsp => "AuthFriendRsp",
            Self::NotifyAuthFriend => "NotifyAuthFriend",
            Self::LogoutReq => "LogoutReq",
            Self::LogoutRsp => "LogoutRsp",
            Self::NotifyOffline => "NotifyOffline",
            Self::TextChatReq => "TextChatReq",
            Self::TextChatRsp => "TextChatRsp",
            Self::NotifyTextChat => "NotifyTextChat",
            Self::CreateGroupReq => "CreateGroupReq",
            Self::CreateGroupRsp => "CreateGroupRsp",
            Self::JoinGroupReq => "JoinGroupReq",
            Self::JoinGroupRsp => "JoinGroupRsp",
            Self::NotifyJoinGroup => "NotifyJoinGroup",
            Self::QuitGroupReq => "QuitGroupReq",
            Self::QuitGroupRsp => "QuitGroupRsp",
            Self::NotifyQuitGroup => "NotifyQuitGroup",
            Self::GroupTextReq => "GroupTextReq",
            Self::GroupTextRsp => "GroupTextRsp",
            Self::NotifyGroupText => "NotifyGroupText",
            Self::GroupMembersReq => "GroupMembersReq",
            Self::GroupMembersRsp => "GroupMembersRsp",
            Self::PeerTextReq => "PeerTextReq",
            Self::PeerTextRsp => "PeerTextRsp",
            Self::PeerAddFriendReq => "PeerAddFriendReq",
            Self::PeerAddFriendRsp => "PeerAddFriendRsp",
            Self::PeerAuthFriendReq => "PeerAuthFriendReq",
            Self::PeerAuthFriendRsp => "PeerAuthFriendRsp",
            Self::PeerKickReq => "PeerKickReq",
            Self::PeerKickRsp => "PeerKickRsp",
            Self::AckReq => "AckReq",
            Self::AckRsp => "AckRsp",
        }
    }
}

impl From<MsgId> for u32 {
    fn from(id: MsgId) -> Self {
        id.as_u32()
    }
}

impl std::fmt::Display for MsgId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u32())
    }
}
