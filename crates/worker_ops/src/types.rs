//! One-byte enums carried inside ops.

use tracing::warn;
use worker_interop::wire_enum;

wire_enum! {
    /// The kind of an op, in tag order.
    pub enum OpKind: "op kind" {
        Disconnect = 1,
        FlagUpdate = 2,
        LogMessage = 3,
        Metrics = 4,
        CriticalSection = 5,
        AddEntity = 6,
        RemoveEntity = 7,
        ReserveEntityIdResponse = 8,
        ReserveEntityIdsResponse = 9,
        CreateEntityResponse = 10,
        DeleteEntityResponse = 11,
        EntityQueryResponse = 12,
        AddComponent = 13,
        RemoveComponent = 14,
        AuthorityChange = 15,
        ComponentUpdate = 16,
        CommandRequest = 17,
        CommandResponse = 18,
    }
}

wire_enum! {
    /// Outcome of a request.
    pub enum StatusCode: "status code" {
        Success = 1,
        Timeout = 2,
        NotFound = 3,
        AuthorityLost = 4,
        PermissionDenied = 5,
        ApplicationError = 6,
        InternalError = 7,
    }
}

wire_enum! {
    /// This worker's authority over one component of one entity.
    pub enum Authority: "authority" {
        NotAuthoritative = 0,
        Authoritative = 1,
        AuthorityLossImminent = 2,
    }
}

wire_enum! {
    /// Why a connection ended, or `Success` while it is up.
    pub enum ConnectionStatusCode: "connection status code" {
        Success = 1,
        InternalError = 2,
        InvalidArgument = 3,
        NetworkError = 4,
        Timeout = 5,
        Cancelled = 6,
        Rejected = 7,
        PlayerIdentityTokenExpired = 8,
        LoginTokenExpired = 9,
        CapacityExceeded = 10,
        RateExceeded = 11,
        ServerShutdown = 12,
    }
}

impl StatusCode {
    /// Decode a status byte from the network. Unknown codes become
    /// `InternalError` so a bad byte reaches the caller as data.
    #[must_use]
    pub fn from_wire(code: u8) -> Self {
        Self::try_from(code).unwrap_or_else(|_| {
            warn!(code, "unknown status code, treating as InternalError");
            Self::InternalError
        })
    }

    #[must_use]
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl ConnectionStatusCode {
    /// As [`StatusCode::from_wire`].
    #[must_use]
    pub fn from_wire(code: u8) -> Self {
        Self::try_from(code).unwrap_or_else(|_| {
            warn!(code, "unknown connection status code, treating as InternalError");
            Self::InternalError
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_kind_codes_are_dense() {
        assert_eq!(OpKind::ALL.len(), 18);
        for (i, kind) in OpKind::ALL.iter().enumerate() {
            assert_eq!(usize::from(kind.code()), i + 1);
            assert_eq!(OpKind::try_from(kind.code()).unwrap(), *kind);
        }
        assert!(OpKind::try_from(0).is_err());
        assert!(OpKind::try_from(19).is_err());
    }

    #[test]
    fn test_unknown_status_is_internal_error() {
        assert_eq!(StatusCode::from_wire(4), StatusCode::AuthorityLost);
        assert_eq!(StatusCode::from_wire(0), StatusCode::InternalError);
        assert_eq!(StatusCode::from_wire(200), StatusCode::InternalError);
        assert_eq!(ConnectionStatusCode::from_wire(12), ConnectionStatusCode::ServerShutdown);
        assert_eq!(ConnectionStatusCode::from_wire(13), ConnectionStatusCode::InternalError);
    }

    #[test]
    fn test_authority_codes() {
        assert_eq!(Authority::AuthorityLossImminent.code(), 2);
        assert_eq!(Authority::try_from(0).unwrap(), Authority::NotAuthoritative);
    }
}
