//! Book files.
//!
//! A book file is line-oriented JSON: one header object carrying the starting position, rules and
//! cost parameters, followed by one object per node. Node references are hashes, move locations
//! are GTP coordinates in the orientation of the node they belong to.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::BTreeSet,
    ffi::OsString,
    fs::{self, File},
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use crate::{
    book::{node::BookMove, values::BookValues, Book, BookNode},
    config::{BoardSetup, CostParams},
    error::BookError,
    game::{BoardDims, Loc, Player, Rules},
    hash::BookHash,
    symmetry::Symmetry,
};

pub const BOOK_VERSION: u32 = 1;

/// Pause between finishing the temporary file and renaming it over the target, giving network
/// filesystems a chance to settle.
const RENAME_DELAY: Duration = Duration::from_millis(200);

const REQUIRED_HEADER_KEYS: &[&str] = &[
    "version",
    "initialBoard",
    "initialRules",
    "initialPla",
    "repBound",
    "initialSymmetry",
];

const REQUIRED_NODE_KEYS: &[&str] = &[
    "hash",
    "pla",
    "symmetries",
    "winLossValue",
    "scoreMean",
    "sharpScoreMean",
    "winLossError",
    "scoreError",
    "scoreStdev",
    "maxPolicy",
    "weight",
    "visits",
    "moves",
    "parents",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookHeader {
    version: u32,
    initial_board: BoardSetup,
    initial_rules: Rules,
    initial_pla: Player,
    rep_bound: u32,
    #[serde(flatten)]
    params: CostParams,
    initial_symmetry: Symmetry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoveRecord {
    #[serde(rename = "move")]
    mv: String,
    symmetry_to_align: Symmetry,
    hash: String,
    raw_policy: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParentRecord {
    hash: String,
    loc: String,
}

fn default_can_expand() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeRecord {
    hash: String,
    pla: Player,
    symmetries: Vec<Symmetry>,
    #[serde(flatten)]
    values: BookValues,
    #[serde(default = "default_can_expand")]
    can_expand: bool,
    moves: Vec<MoveRecord>,
    parents: Vec<ParentRecord>,
}

impl NodeRecord {
    fn from_node(node: &BookNode, dims: BoardDims) -> Self {
        NodeRecord {
            hash: node.hash.to_string(),
            pla: node.pla,
            symmetries: node.symmetries.clone(),
            values: node.this_values_not_in_book,
            can_expand: node.can_expand,
            moves: node
                .moves
                .values()
                .map(|edge| MoveRecord {
                    mv: edge.mv.to_gtp(dims),
                    symmetry_to_align: edge.symmetry_to_align,
                    hash: edge.hash.to_string(),
                    raw_policy: edge.raw_policy,
                })
                .collect(),
            parents: node
                .parents
                .iter()
                .map(|(hash, loc)| ParentRecord {
                    hash: hash.to_string(),
                    loc: loc.to_gtp(dims),
                })
                .collect(),
        }
    }

    fn into_node(self, dims: BoardDims) -> Result<BookNode, BookError> {
        let mut node = BookNode::new(BookHash::try_from(self.hash)?, self.pla, self.symmetries);
        node.this_values_not_in_book = self.values;
        node.can_expand = self.can_expand;
        for record in self.moves {
            let mv = Loc::from_gtp(&record.mv, dims)?;
            let hash = BookHash::try_from(record.hash)?;
            node.moves
                .insert(mv, BookMove::new(mv, record.symmetry_to_align, hash, record.raw_policy));
        }
        for record in self.parents {
            node.parents
                .push((BookHash::try_from(record.hash)?, Loc::from_gtp(&record.loc, dims)?));
        }
        Ok(node)
    }
}

fn parse_line(line: &str, required: &[&str]) -> Result<Value, BookError> {
    let value: Value = serde_json::from_str(line).map_err(|e| BookError::from(e).with_line(line))?;
    for key in required {
        if value.get(key).is_none() {
            return Err(BookError::missing_field(key, line));
        }
    }
    Ok(value)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp: OsString = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

impl Book {
    /// Write the book to `path`, going through a temporary file so that an interrupted save
    /// leaves any previous file intact.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), BookError> {
        let path = path.as_ref();
        let tmp = tmp_path(path);
        let written = self.write_lines(&tmp).and_then(|()| {
            thread::sleep(RENAME_DELAY);
            fs::rename(&tmp, path).map_err(BookError::from)
        });
        if let Err(e) = written {
            if let Err(remove_err) = fs::remove_file(&tmp) {
                if remove_err.kind() != io::ErrorKind::NotFound {
                    tracing::warn!("[Book::save_to_file] Could not remove {:?}: {remove_err}", tmp);
                }
            }
            return Err(e);
        }
        tracing::info!(
            "[Book::save_to_file] Saved {} nodes to {:?}",
            self.nodes.len(),
            path
        );
        Ok(())
    }

    fn write_lines(&self, tmp: &Path) -> Result<(), BookError> {
        let dims = self.dims();
        let mut out = BufWriter::new(File::create(tmp)?);
        let header = BookHeader {
            version: BOOK_VERSION,
            initial_board: BoardSetup::from_board(&self.initial_board),
            initial_rules: self.initial_rules,
            initial_pla: self.initial_pla,
            rep_bound: self.rep_bound,
            params: self.params,
            initial_symmetry: self.initial_symmetry.symmetry(),
        };
        serde_json::to_writer(&mut out, &header)?;
        writeln!(out)?;
        for node in &self.nodes {
            serde_json::to_writer(&mut out, &NodeRecord::from_node(node, dims))?;
            writeln!(out)?;
        }
        out.flush()?;
        Ok(())
    }

    /// Read a book written by [`Book::save_to_file`] and recompute all derived values.
    ///
    /// References to nodes absent from the file are dropped with a warning.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Book, BookError> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let mut lines = reader.lines();

        let header_line = lines.next().transpose()?.unwrap_or_default();
        let header_value = parse_line(&header_line, &["version"])?;
        let version = header_value
            .get("version")
            .and_then(Value::as_u64)
            .ok_or_else(|| BookError::missing_field("version", &header_line))?;
        if version != BOOK_VERSION as u64 {
            return Err(BookError::UnsupportedVersion(
                u32::try_from(version).unwrap_or(u32::MAX),
            ));
        }
        let header_value = parse_line(&header_line, REQUIRED_HEADER_KEYS)?;
        let header: BookHeader =
            serde_json::from_value(header_value).map_err(|e| BookError::from(e).with_line(&header_line))?;

        header.params.validate()?;
        let initial_board = header
            .initial_board
            .build()
            .map_err(|e| e.with_line(&header_line))?;
        let mut book = Book::from_parts(
            initial_board,
            header.initial_rules,
            header.initial_pla,
            header.rep_bound,
            header.params,
        );
        if book.initial_symmetry.symmetry() != header.initial_symmetry {
            return Err(BookError::InconsistentRoot(format!(
                "initial symmetry {} in file, {} computed",
                header.initial_symmetry,
                book.initial_symmetry.symmetry()
            )));
        }

        let dims = book.dims();
        let root_hash = book.root_hash();
        let mut found_root = false;
        for line in lines {
            let line = line?;
            if line.trim().is_empty() {
                break;
            }
            let value = parse_line(&line, REQUIRED_NODE_KEYS)?;
            let record: NodeRecord =
                serde_json::from_value(value).map_err(|e| BookError::from(e).with_line(&line))?;
            let node = record.into_node(dims).map_err(|e| e.with_line(&line))?;

            if node.hash == root_hash {
                let root = book.node(0);
                if root.pla != node.pla || root.symmetries != node.symmetries {
                    return Err(BookError::InconsistentRoot(format!(
                        "root {} stored as {} to move with symmetries {:?}, computed {} with {:?}",
                        root_hash, node.pla, node.symmetries, root.pla, root.symmetries
                    )));
                }
                found_root = true;
            }
            match book.get_mut(node.hash) {
                Some(existing) => {
                    if node.hash != root_hash {
                        tracing::warn!("[Book::load_from_file] Duplicate node {}", node.hash);
                    }
                    *existing = node;
                }
                None => {
                    book.add(node);
                }
            }
        }
        if !found_root {
            return Err(BookError::InconsistentRoot(format!(
                "no node with root hash {root_hash} in {path:?}"
            )));
        }

        let known: BTreeSet<BookHash> = book.nodes.iter().map(|node| node.hash).collect();
        for node in book.nodes.iter_mut() {
            let hash = node.hash;
            node.moves.retain(|_, edge| {
                let keep = known.contains(&edge.hash);
                if !keep {
                    tracing::warn!("[Book::load_from_file] Dropping edge {hash} -> unknown {}", edge.hash);
                }
                keep
            });
            node.parents.retain(|(parent, _)| {
                let keep = known.contains(parent);
                if !keep {
                    tracing::warn!("[Book::load_from_file] Dropping unknown parent {parent} of {hash}");
                }
                keep
            });
        }

        book.recompute_everything();
        tracing::info!(
            "[Book::load_from_file] Loaded {} nodes from {:?}",
            book.nodes.len(),
            path
        );
        Ok(book)
    }
}
