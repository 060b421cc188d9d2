use crate::facts::Predicate;

/// Naming and authority contract of one protocol revision.
///
/// All facts are written as `<namespace>:<predicate>`; `authority` lists the
/// predicates the token builder always places in block 0, exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolProfile {
    pub namespace: &'static str,
    pub authority: &'static [Predicate],
}

/// The current Theoriq protocol.
pub const THEORIQ: ProtocolProfile = ProtocolProfile {
    namespace: "theoriq",
    authority: &[Predicate::Subject, Predicate::ExpiresAt],
};

impl ProtocolProfile {
    pub fn predicate_name(&self, predicate: Predicate) -> String {
        format!("{}:{}", self.namespace, predicate.name())
    }

    pub fn is_authority(&self, predicate: Predicate) -> bool {
        self.authority.contains(&predicate)
    }
}

impl Default for ProtocolProfile {
    fn default() -> Self {
        THEORIQ
    }
}
