use std::fmt;

/// Common surface of every governance rule variant.
pub trait GovernanceRule: fmt::Debug + fmt::Display + Send + Sync {
    fn resource_name(&self) -> String;

    fn is_valid(&self) -> crate::Result<()> {
        Ok(())
    }
}
