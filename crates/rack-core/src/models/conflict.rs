//! Sync conflict model

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::clothing::{ClothingId, ClothingItem};

/// Why a record is out of sync. Wire values are stable across client/server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictReason {
    ServerHasNewer,
    ClientHasNewer,
    MissingOnServer,
    MissingOnClient,
}

impl ConflictReason {
    /// Small-integer wire code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::ServerHasNewer => 0,
            Self::ClientHasNewer => 1,
            Self::MissingOnServer => 2,
            Self::MissingOnClient => 3,
        }
    }

    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::ServerHasNewer),
            1 => Some(Self::ClientHasNewer),
            2 => Some(Self::MissingOnServer),
            3 => Some(Self::MissingOnClient),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ServerHasNewer => "SERVER_HAS_NEWER",
            Self::ClientHasNewer => "CLIENT_HAS_NEWER",
            Self::MissingOnServer => "MISSING_ON_SERVER",
            Self::MissingOnClient => "MISSING_ON_CLIENT",
        }
    }
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A computed mismatch between the local and remote copy of one record.
///
/// Each variant carries only the copies needed to act on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Conflict {
    /// Both sides hold the record; the local edit is newer.
    ClientHasNewer {
        client: ClothingItem,
        server: ClothingItem,
    },
    /// Both sides hold the record; the remote edit is strictly newer.
    ServerHasNewer {
        client: ClothingItem,
        server: ClothingItem,
    },
    /// Only the local store has the record.
    MissingOnServer { client: ClothingItem },
    /// Only the remote listing has the record.
    MissingOnClient { server: ClothingItem },
}

impl Conflict {
    #[must_use]
    pub const fn reason(&self) -> ConflictReason {
        match self {
            Self::ClientHasNewer { .. } => ConflictReason::ClientHasNewer,
            Self::ServerHasNewer { .. } => ConflictReason::ServerHasNewer,
            Self::MissingOnServer { .. } => ConflictReason::MissingOnServer,
            Self::MissingOnClient { .. } => ConflictReason::MissingOnClient,
        }
    }

    #[must_use]
    pub const fn id(&self) -> ClothingId {
        match self {
            Self::ClientHasNewer { client, .. }
            | Self::ServerHasNewer { client, .. }
            | Self::MissingOnServer { client } => client.id,
            Self::MissingOnClient { server } => server.id,
        }
    }

    #[must_use]
    pub const fn client_copy(&self) -> Option<&ClothingItem> {
        match self {
            Self::ClientHasNewer { client, .. }
            | Self::ServerHasNewer { client, .. }
            | Self::MissingOnServer { client } => Some(client),
            Self::MissingOnClient { .. } => None,
        }
    }

    #[must_use]
    pub const fn server_copy(&self) -> Option<&ClothingItem> {
        match self {
            Self::ClientHasNewer { server, .. }
            | Self::ServerHasNewer { server, .. }
            | Self::MissingOnClient { server } => Some(server),
            Self::MissingOnServer { .. } => None,
        }
    }
}

/// Conflicts keyed by record id, ordered for stable presentation.
pub type ConflictMap = BTreeMap<ClothingId, Conflict>;
