/// Constants used throughout the kresolve codebase
// Reference scheme marking a build target inside a manifest
pub const REFERENCE_SCHEME: &str = "ko://";

// Environment variable names
pub const DOCKER_REPO_VAR: &str = "KRESOLVE_DOCKER_REPO";
pub const LOG_VAR: &str = "KRESOLVE_LOG";

// Written after every resolved file so a streaming consumer knows the
// preceding documents are complete.
pub const RECORD_SEPARATOR: &str = "\n---\n";

// Separator between documents of the same file
pub const DOCUMENT_SEPARATOR: &str = "---\n";

// Extensions picked up when a directory is enumerated
pub const MANIFEST_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

// Filename standing for standard input
pub const STDIN_FILENAME: &str = "-";

// Watch mode
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;

// Length of the key hash suffix used by the default naming strategy
pub const NAME_HASH_LEN: usize = 8;
