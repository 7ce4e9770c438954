/// Internal parts for parsing DOC file structures.
///
/// This module contains parsers for the binary structures used in
/// legacy Word documents:
/// - FIB (File Information Block)
/// - Piece table (CP to FC mapping and text decoding)
/// - Character properties, FKP pages and the CHPX bin table
pub mod chp;
pub mod chp_bin_table;
pub mod fib;
pub mod fkp;
pub mod piece_table;
