//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract, and scripts rely on them.
//!
//! | Code | Meaning                                             |
//! |------|-----------------------------------------------------|
//! | 0    | Success                                             |
//! | 2    | Usage error (bad args, no input file configured)    |
//! | 3    | Cannot read or write a file                         |
//! | 4    | Invalid config                                      |
//! | 5    | Input schema error (missing column, broken CSV)     |
//! | 6    | Unmatched ratio above threshold (`run --strict`)    |
//! | 7    | Client has no sale rows (`client`)                  |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// File could not be read, decoded or written.
pub const EXIT_IO: u8 = 3;

/// TOML parse or validation failure.
pub const EXIT_INVALID_CONFIG: u8 = 4;

/// Required column absent or CSV structure unreadable.
pub const EXIT_SCHEMA: u8 = 5;

/// Too many sale rows without a catalog match, with `--strict`.
pub const EXIT_UNMATCHED_RATIO: u8 = 6;

/// `circles client` found no sale rows for the id.
pub const EXIT_CLIENT_NOT_FOUND: u8 = 7;
