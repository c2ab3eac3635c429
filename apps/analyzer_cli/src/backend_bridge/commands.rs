//! Backend commands queued from the front end to the backend worker.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCommand {
    SetUrl { url: String },
    Submit,
    Shutdown,
}

impl BackendCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetUrl { .. } => "set_url",
            Self::Submit => "submit",
            Self::Shutdown => "shutdown",
        }
    }
}
