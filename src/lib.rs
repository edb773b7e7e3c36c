pub mod io;
pub mod models;
pub mod render;
pub mod session;

pub use io::{
    default_annotated_path, default_labeled_path, load_mapping, parse_mapping, read_transcript,
    write_mapping_skeleton, write_text, IdentificationReport,
};
pub use models::{
    extract_tokens, group_by_chunk, parse_utterances, ChunkGroup, KeyMap, Utterance,
    MIN_SUBSTANTIAL_LEN,
};
pub use render::{annotate_transcript, apply_labels};
pub use session::prompt::{run_prompt, Key, KeySource, TerminalKeys};
pub use session::report::{conflicting_tokens, format_identifications};
pub use session::table::{run_table, TableApp};
pub use session::{
    Direction, IdentificationOutcome, IdentificationSession, SessionError, UtteranceState,
};
