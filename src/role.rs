//! The stable identifier naming one configured sink.

use std::fmt;

/// One of the four built-in sink roles. Process-lifetime constant, used to
/// select a sink, a transformer, and a rate limiter for a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SinkRole {
    Rest,
    Grpc,
    Mq,
    Db,
}

impl SinkRole {
    pub const ALL: [SinkRole; 4] = [SinkRole::Rest, SinkRole::Grpc, SinkRole::Mq, SinkRole::Db];

    pub fn as_str(&self) -> &'static str {
        match self {
            SinkRole::Rest => "REST",
            SinkRole::Grpc => "GRPC",
            SinkRole::Mq => "MQ",
            SinkRole::Db => "DB",
        }
    }
}

impl fmt::Display for SinkRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_lists_every_role_exactly_once() {
        assert_eq!(SinkRole::ALL.len(), 4);
        assert_eq!(SinkRole::ALL[0], SinkRole::Rest);
        assert_eq!(SinkRole::ALL[3], SinkRole::Db);
    }

    #[test]
    fn display_matches_role_name() {
        assert_eq!(SinkRole::Rest.to_string(), "REST");
        assert_eq!(SinkRole::Grpc.to_string(), "GRPC");
    }
}
