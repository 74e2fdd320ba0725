//! Read-only access to StarDict dictionaries.
//!
//! A StarDict dictionary is a set of co-located files sharing a base name:
//! textual metadata (`.ifo`), a sorted headword index (`.idx`, optionally
//! gzip-compressed), the article payload (`.dict`, optionally
//! dictzip-compressed for random access), and an optional synonym index
//! (`.syn`). This crate opens such a dictionary, answers exact and glob
//! lookups against a folded in-memory index, and returns typed article
//! data.
//!
//! ```no_run
//! use stardict_reader::Stardict;
//!
//! # fn main() -> stardict_reader::Result<()> {
//! let dict = Stardict::open("dictionary.ifo")?;
//! for entry in dict.search("hoge")? {
//!     println!("{}", entry.render());
//! }
//! # Ok(())
//! # }
//! ```

pub mod stardict;

pub use stardict::dict::{parse_article, write_article, Data, DataType, Dict};
pub use stardict::error::{Result, StardictError};
pub use stardict::fold::{Folder, NopFolder, UnicodeFolder};
pub use stardict::idx::{Idx, IdxEntry, IdxScanner, OffsetBits};
pub use stardict::ifo::Ifo;
pub use stardict::syn::{SynEntry, SynScanner};
pub use stardict::{open_all, Entry, Options, Stardict, IFO_MAGIC};
