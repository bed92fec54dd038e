pub mod audit_writer;
pub mod document_converter;
pub mod extraction_service;
pub mod identifier_recovery;
pub mod prompts;
pub mod reconciliation;
pub mod roster_lookup;
pub mod similarity_index;
pub mod validator;

pub use audit_writer::{AuditRecord, AuditWriter};
pub use document_converter::{CommandConverter, DocumentConverter};
pub use extraction_service::{DocumentExtractor, ExtractionService};
pub use identifier_recovery::IdentifierRecovery;
pub use reconciliation::{parse_verdicts, ReconciliationEngine};
pub use roster_lookup::{parse_roster_page, PortalRosterLookup, RosterLookup};
pub use similarity_index::{EmbeddingIndex, ExamSimilarityIndex, SimilarityIndex, SynonymRecord};
pub use validator::Validator;
