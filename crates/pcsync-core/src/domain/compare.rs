//! Compare plan
//!
//! A dry run produces an ordered list of [`CompareItem`]s, each describing one
//! operation a real sync would perform. The list is rendered as a numbered
//! report followed by per-category totals.

use std::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};

const RULE: &str = "--------------------------------------------------------------";

/// What would happen to the object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Create,
    Delete,
    Upload,
    Download,
}

impl CompareOp {
    #[must_use]
    pub fn symbol(self) -> char {
        match self {
            CompareOp::Create => '+',
            CompareOp::Delete => '-',
            CompareOp::Upload => 'A',
            CompareOp::Download => 'V',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    File,
    Directory,
}

impl ObjectType {
    #[must_use]
    pub fn symbol(self) -> char {
        match self {
            ObjectType::File => 'F',
            ObjectType::Directory => 'D',
        }
    }
}

/// Which side the operation applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Local,
    Remote,
}

impl Side {
    #[must_use]
    pub fn symbol(self) -> char {
        match self {
            Side::Local => 'L',
            Side::Remote => 'R',
        }
    }
}

/// One planned operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareItem {
    pub op: CompareOp,
    pub object_type: ObjectType,
    pub side: Side,
    pub path: String,
}

impl CompareItem {
    pub fn new(op: CompareOp, object_type: ObjectType, side: Side, path: impl Into<String>) -> Self {
        Self {
            op,
            object_type,
            side,
            path: path.into(),
        }
    }
}

impl fmt::Display for CompareItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}:{}",
            self.op.symbol(),
            self.object_type.symbol(),
            self.side.symbol(),
            self.path
        )
    }
}

/// Per-category counts of a [`CompareReport`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareTotals {
    pub create_local_file: usize,
    pub create_remote_file: usize,
    pub create_local_dir: usize,
    pub create_remote_dir: usize,
    pub remove_local_file: usize,
    pub remove_remote_file: usize,
    pub remove_local_dir: usize,
    pub remove_remote_dir: usize,
    pub upload: usize,
    pub download: usize,
    pub total: usize,
}

/// Ordered result of a Compare run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareReport {
    pub items: Vec<CompareItem>,
}

impl CompareReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: CompareOp, object_type: ObjectType, side: Side, path: impl Into<String>) {
        self.items.push(CompareItem::new(op, object_type, side, path));
    }

    /// No pending operation at all
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn totals(&self) -> CompareTotals {
        let mut totals = CompareTotals {
            total: self.items.len(),
            ..CompareTotals::default()
        };
        for item in &self.items {
            let counter = match (item.op, item.object_type, item.side) {
                (CompareOp::Create, ObjectType::File, Side::Local) => &mut totals.create_local_file,
                (CompareOp::Create, ObjectType::File, Side::Remote) => &mut totals.create_remote_file,
                (CompareOp::Create, ObjectType::Directory, Side::Local) => &mut totals.create_local_dir,
                (CompareOp::Create, ObjectType::Directory, Side::Remote) => {
                    &mut totals.create_remote_dir
                }
                (CompareOp::Delete, ObjectType::File, Side::Local) => &mut totals.remove_local_file,
                (CompareOp::Delete, ObjectType::File, Side::Remote) => &mut totals.remove_remote_file,
                (CompareOp::Delete, ObjectType::Directory, Side::Local) => &mut totals.remove_local_dir,
                (CompareOp::Delete, ObjectType::Directory, Side::Remote) => {
                    &mut totals.remove_remote_dir
                }
                (CompareOp::Upload, _, _) => &mut totals.upload,
                (CompareOp::Download, _, _) => &mut totals.download,
            };
            *counter += 1;
        }
        totals
    }

    /// Numbered listing plus totals, as printed by the `compare` command
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "        | L R Local Path");
        let _ = writeln!(out, "{RULE}");
        for (index, item) in self.items.iter().enumerate() {
            let _ = writeln!(out, "{:8}| {item}", index + 1);
        }
        let _ = writeln!(out, "{RULE}");

        let t = self.totals();
        let _ = writeln!(
            out,
            "  Create {} Local File, Create {} Remote File",
            t.create_local_file, t.create_remote_file
        );
        let _ = writeln!(
            out,
            "  Create {} Local Dir , Create {} Remote Dir",
            t.create_local_dir, t.create_remote_dir
        );
        let _ = writeln!(
            out,
            "  Remove {} Local File, Remove {} Remote File",
            t.remove_local_file, t.remove_remote_file
        );
        let _ = writeln!(
            out,
            "  Remove {} Local Dir , Remove {} Remote Dir",
            t.remove_local_dir, t.remove_remote_dir
        );
        let _ = writeln!(
            out,
            "  Upload {} Local File, Download {} Remote File.",
            t.upload, t.download
        );
        let _ = writeln!(out, " Total: {}", t.total);
        out
    }
}
