//! Identity of the calling process

/// Host name and process identifier a lock presents to the cluster
///
/// The lock never looks these up by itself; they are supplied once when the
/// context is built so tests can simulate many processes in one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProcessIdentity {
    pub host_name: String,
    pub pid: u32,
}

impl ProcessIdentity {
    pub fn new(host_name: impl Into<String>, pid: u32) -> Self {
        Self {
            host_name: host_name.into(),
            pid,
        }
    }
}

impl std::fmt::Display for ProcessIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host_name, self.pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ProcessIdentity::new("web1", 42).to_string(), "web1:42");
    }
}
