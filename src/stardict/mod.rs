//! Core StarDict reader module.

pub mod dict;
mod dictzip;
pub mod error;
pub mod fold;
mod glob;
pub mod idx;
mod index;
pub mod ifo;
mod scanner;
pub mod syn;

use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use flate2::read::GzDecoder;
use log::{debug, info};

use self::dict::{Data, DataType, Dict};
use self::error::{Result, StardictError};
use self::fold::{Folder, UnicodeFolder};
use self::idx::{Idx, IdxScanner, OffsetBits};
use self::ifo::Ifo;
use self::syn::SynScanner;

/// The magic first line of every `.ifo` file.
pub const IFO_MAGIC: &str = "StarDict's dict ifo file";

// Candidate sibling extensions, in trial order.
const IDX_EXTENSIONS: &[&str] = &[
    ".idx", ".idx.gz", ".idx.GZ", ".idx.dz", ".idx.DZ", ".IDX", ".IDX.gz", ".IDX.GZ", ".IDX.dz",
    ".IDX.DZ",
];
const SYN_EXTENSIONS: &[&str] = &[
    ".syn", ".syn.gz", ".syn.GZ", ".syn.dz", ".syn.DZ", ".SYN", ".SYN.gz", ".SYN.GZ", ".SYN.dz",
    ".SYN.DZ",
];
const DICT_EXTENSIONS: &[&str] = &[
    ".dict", ".dict.dz", ".dict.DZ", ".DICT", ".DICT.dz", ".DICT.DZ",
];

/// Options for opening a dictionary.
#[derive(Clone)]
pub struct Options {
    /// The folding pipeline applied to headwords, synonyms, and queries.
    pub folder: Arc<dyn Folder>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            folder: Arc::new(UnicodeFolder),
        }
    }
}

/// A dictionary entry returned by [`Stardict::search`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    headword: String,
    data: Vec<Data>,
}

impl Entry {
    /// The headword as stored in the `.idx` file.
    pub fn headword(&self) -> &str {
        &self.headword
    }

    /// The entry's typed data blocks.
    pub fn data(&self) -> &[Data] {
        &self.data
    }

    /// Render the entry for display: the headword followed by the rendered
    /// text of each block that has a textual form.
    pub fn render(&self) -> String {
        let mut out = String::from(self.headword());
        out.push('\n');
        for block in self.data() {
            let text = block.render();
            if !text.is_empty() {
                out.push_str(&text);
                out.push('\n');
            }
        }
        out
    }
}

/// An open StarDict dictionary.
///
/// Opening parses and validates only the `.ifo` metadata. The `.idx` (plus
/// `.syn`) index and the `.dict` payload reader are built lazily on first
/// use and shared for the dictionary's lifetime; once built they are
/// immutable, so a `Stardict` can serve concurrent readers.
pub struct Stardict {
    ifo_path: PathBuf,

    version: String,
    bookname: String,
    wordcount: u64,
    synwordcount: Option<u64>,
    idxfilesize: u64,
    offset_bits: OffsetBits,
    author: Option<String>,
    email: Option<String>,
    website: Option<String>,
    description: Option<String>,
    same_type_sequence: Vec<DataType>,

    folder: Arc<dyn Folder>,
    idx: OnceLock<Idx>,
    dict: OnceLock<Dict>,
}

impl Stardict {
    /// Open a dictionary from the path of its `.ifo` file, using the
    /// default folding pipeline.
    pub fn open(ifo_path: impl AsRef<Path>) -> Result<Stardict> {
        Self::open_with_options(ifo_path, Options::default())
    }

    /// Open a dictionary from the path of its `.ifo` file.
    pub fn open_with_options(ifo_path: impl AsRef<Path>, options: Options) -> Result<Stardict> {
        let path = ifo_path.as_ref();
        match path.extension().and_then(OsStr::to_str) {
            Some("ifo") | Some("IFO") => {}
            _ => {
                return Err(StardictError::IfoExtension {
                    path: path.to_owned(),
                })
            }
        }

        let file = File::open(path).map_err(|e| StardictError::OpenFile {
            path: path.to_owned(),
            source: e,
        })?;
        let ifo = Ifo::read(BufReader::new(file))?;

        if ifo.magic() != IFO_MAGIC {
            return Err(StardictError::InvalidMagic {
                path: path.to_owned(),
            });
        }

        let version = ifo.value("version").unwrap_or_default();
        match version {
            "2.4.2" | "3.0.0" => {}
            other => return Err(StardictError::InvalidVersion(other.to_owned())),
        }

        let bookname = ifo.value("bookname").unwrap_or_default();
        if bookname.is_empty() {
            return Err(StardictError::MissingBookname);
        }

        let wordcount = required_u64(&ifo, "wordcount")?;
        let idxfilesize = required_u64(&ifo, "idxfilesize")?;

        // idxoffsetbits is only honored for version 3.0.0 files.
        let mut offset_bits = OffsetBits::Bits32;
        if version == "3.0.0" {
            if let Some(value) = ifo.value("idxoffsetbits") {
                let bits: u64 = value.parse().map_err(|e| StardictError::InvalidNumber {
                    key: "idxoffsetbits",
                    source: e,
                })?;
                offset_bits = OffsetBits::try_from(bits)?;
            }
        }

        let synwordcount = match ifo.value("synwordcount") {
            Some(value) => Some(value.parse().map_err(|e| StardictError::InvalidNumber {
                key: "synwordcount",
                source: e,
            })?),
            None => None,
        };

        let mut same_type_sequence = Vec::new();
        if let Some(sequence) = ifo.value("sametypesequence") {
            for c in sequence.chars() {
                let byte = u8::try_from(c).map_err(|_| StardictError::InvalidType(c))?;
                same_type_sequence.push(DataType::try_from(byte)?);
            }
        }

        info!("opened dictionary {bookname:?} (version {version}, {wordcount} words)");

        Ok(Stardict {
            ifo_path: path.to_owned(),
            version: version.to_owned(),
            bookname: bookname.to_owned(),
            wordcount,
            synwordcount,
            idxfilesize,
            offset_bits,
            author: ifo.value("author").map(str::to_owned),
            email: ifo.value("email").map(str::to_owned),
            website: ifo.value("website").map(str::to_owned),
            description: ifo.value("description").map(|d| d.replace("<br>", "\n")),
            same_type_sequence,
            folder: options.folder,
            idx: OnceLock::new(),
            dict: OnceLock::new(),
        })
    }

    /// The dictionary display name.
    pub fn bookname(&self) -> &str {
        &self.bookname
    }

    /// The dictionary format version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The declared number of `.idx` entries.
    pub fn word_count(&self) -> u64 {
        self.wordcount
    }

    /// The declared number of `.syn` entries, when present.
    pub fn syn_word_count(&self) -> Option<u64> {
        self.synwordcount
    }

    /// The declared byte size of the (decompressed) `.idx` file.
    pub fn idx_file_size(&self) -> u64 {
        self.idxfilesize
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn website(&self) -> Option<&str> {
        self.website.as_deref()
    }

    /// The dictionary description, with `<br>` already rewritten to `\n`.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The in-memory search index, built on first use from the `.idx` file
    /// and merged with the `.syn` file when one exists.
    pub fn index(&self) -> Result<&Idx> {
        if let Some(idx) = self.idx.get() {
            return Ok(idx);
        }
        let idx = self.build_index()?;
        Ok(self.idx.get_or_init(|| idx))
    }

    /// The `.dict` payload reader, opened on first use.
    pub fn dict(&self) -> Result<&Dict> {
        if let Some(dict) = self.dict.get() {
            return Ok(dict);
        }
        let dict = self.build_dict()?;
        Ok(self.dict.get_or_init(|| dict))
    }

    /// Search the dictionary and return full entries, in index order.
    pub fn search(&self, query: &str) -> Result<Vec<Entry>> {
        let index = self.index()?;
        let dict = self.dict()?;

        let mut entries = Vec::new();
        for word in index.search(query)? {
            entries.push(Entry {
                headword: word.word.clone(),
                data: dict.word(word)?,
            });
        }
        Ok(entries)
    }

    /// Close the dictionary, releasing every underlying file handle.
    pub fn close(self) {
        drop(self);
    }

    fn build_index(&self) -> Result<Idx> {
        let (file, path) = open_sibling(&self.ifo_path, IDX_EXTENSIONS, ".idx")?;
        debug!("building index from {}", path.display());
        let scanner = IdxScanner::new(decompressed(file, &path), self.offset_bits);

        let syn = match open_sibling(&self.ifo_path, SYN_EXTENSIONS, ".syn") {
            Ok((file, path)) => {
                debug!("merging synonyms from {}", path.display());
                Some(SynScanner::new(decompressed(file, &path)))
            }
            Err(StardictError::SiblingNotFound { .. }) => None,
            Err(e) => return Err(e),
        };

        Idx::new(scanner, syn, Arc::clone(&self.folder))
    }

    fn build_dict(&self) -> Result<Dict> {
        let (file, path) = open_sibling(&self.ifo_path, DICT_EXTENSIONS, ".dict")?;
        debug!("opening dict payload {}", path.display());
        if has_extension(&path, "dz") {
            Dict::dictzip(file, self.same_type_sequence.clone())
        } else {
            Ok(Dict::plain(file, self.same_type_sequence.clone()))
        }
    }
}

/// Open all dictionaries under a directory.
///
/// Every file with an `.ifo` or `.IFO` extension is tried. The walk never
/// fails as a whole: successfully opened dictionaries are returned together
/// with the errors accumulated along the way.
pub fn open_all(path: impl AsRef<Path>) -> (Vec<Stardict>, Vec<StardictError>) {
    let mut dicts = Vec::new();
    let mut errors = Vec::new();
    walk(path.as_ref(), &mut dicts, &mut errors);
    (dicts, errors)
}

fn walk(dir: &Path, dicts: &mut Vec<Stardict>, errors: &mut Vec<StardictError>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            errors.push(StardictError::OpenFile {
                path: dir.to_owned(),
                source: e,
            });
            return;
        }
    };
    for entry in entries {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                errors.push(StardictError::Io(e));
                continue;
            }
        };
        if path.is_dir() {
            walk(&path, dicts, errors);
        } else if matches!(
            path.extension().and_then(OsStr::to_str),
            Some("ifo") | Some("IFO")
        ) {
            match Stardict::open(&path) {
                Ok(dict) => dicts.push(dict),
                Err(e) => errors.push(e),
            }
        }
    }
}

fn required_u64(ifo: &Ifo, key: &'static str) -> Result<u64> {
    ifo.value(key)
        .unwrap_or_default()
        .parse()
        .map_err(|e| StardictError::InvalidNumber { key, source: e })
}

// Try each candidate extension in order. Not-found recovers to the next
// candidate; any other open failure is fatal.
fn open_sibling(
    ifo_path: &Path,
    extensions: &[&str],
    kind: &'static str,
) -> Result<(File, PathBuf)> {
    let base = ifo_path.with_extension("");
    for ext in extensions {
        let mut candidate = base.clone().into_os_string();
        candidate.push(ext);
        let candidate = PathBuf::from(candidate);
        match File::open(&candidate) {
            Ok(file) => return Ok((file, candidate)),
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(StardictError::OpenFile {
                    path: candidate,
                    source: e,
                })
            }
        }
    }
    Err(StardictError::SiblingNotFound { kind, base })
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

// The .idx and .syn files may be gzip-compressed (including dictzip, which
// is valid gzip when read as a stream).
fn decompressed(file: File, path: &Path) -> Box<dyn BufRead> {
    if has_extension(path, "gz") || has_extension(path, "dz") {
        Box::new(BufReader::new(GzDecoder::new(BufReader::new(file))))
    } else {
        Box::new(BufReader::new(file))
    }
}
