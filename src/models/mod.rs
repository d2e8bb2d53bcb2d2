pub mod enums;
pub mod conversation;
pub mod note;
pub mod patient;
pub mod record;
pub mod settings;

pub use enums::*;
pub use conversation::{Conversation, Message};
pub use note::DoctorNote;
pub use patient::{DiagnosisCandidate, Patient};
pub use record::HealthRecordSummary;
pub use settings::{AccountSettings, AiSettings};
