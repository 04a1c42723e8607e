/// Who is performing the request, as recorded in the audit trail.
///
/// Taken from the `X-Actor` header; authentication happens upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    actor: String,
}

impl ActorContext {
    pub const DEFAULT: &'static str = "system";

    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
        }
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }
}

impl Default for ActorContext {
    fn default() -> Self {
        Self::new(Self::DEFAULT)
    }
}
