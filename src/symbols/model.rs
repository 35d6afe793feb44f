//! Record types of a symbol snapshot.
//!
//! A snapshot is the JSON form of what a debug-symbol reader extracted from
//! one program database. Field names follow the JSON keys; every collection
//! other than `symbols` is optional, and a missing one makes the matching
//! table's source unavailable rather than empty.

use serde::{Deserialize, Serialize};

/// Kind of a global symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymTag {
    Function,
    Public,
    Data,
    Udt,
    Enum,
    Typedef,
    Thunk,
    Label,
}

impl SymTag {
    pub const ALL: [SymTag; 8] = [
        SymTag::Function,
        SymTag::Public,
        SymTag::Data,
        SymTag::Udt,
        SymTag::Enum,
        SymTag::Typedef,
        SymTag::Thunk,
        SymTag::Label,
    ];

    /// SQL table holding symbols of this kind.
    pub fn table_name(&self) -> &'static str {
        match self {
            SymTag::Function => "functions",
            SymTag::Public => "publics",
            SymTag::Data => "data",
            SymTag::Udt => "udts",
            SymTag::Enum => "enums",
            SymTag::Typedef => "typedefs",
            SymTag::Thunk => "thunks",
            SymTag::Label => "labels",
        }
    }

    /// Label used in the summary listing.
    pub fn label(&self) -> &'static str {
        match self {
            SymTag::Function => "Functions",
            SymTag::Public => "Public Symbols",
            SymTag::Data => "Data",
            SymTag::Udt => "UDTs",
            SymTag::Enum => "Enums",
            SymTag::Typedef => "Typedefs",
            SymTag::Thunk => "Thunks",
            SymTag::Label => "Labels",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: u32,
    pub tag: SymTag,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undecorated: Option<String>,
    #[serde(default)]
    pub rva: u32,
    #[serde(default)]
    pub length: u64,
    #[serde(default)]
    pub section: u32,
    #[serde(default)]
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compiland {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub library: String,
    /// CodeView language code.
    #[serde(default)]
    pub language: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    pub id: u32,
    pub filename: String,
    #[serde(default)]
    pub checksum_type: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineNumber {
    pub file_id: u32,
    pub line: u32,
    #[serde(default)]
    pub column: u32,
    pub rva: u32,
    #[serde(default)]
    pub length: u32,
    pub compiland_id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub number: u32,
    pub rva: u32,
    pub length: u32,
    /// PE section characteristics.
    pub characteristics: u32,
}

const IMAGE_SCN_CNT_CODE: u32 = 0x0000_0020;
const IMAGE_SCN_MEM_EXECUTE: u32 = 0x2000_0000;
const IMAGE_SCN_MEM_READ: u32 = 0x4000_0000;
const IMAGE_SCN_MEM_WRITE: u32 = 0x8000_0000;

impl Section {
    pub fn readable(&self) -> bool {
        self.characteristics & IMAGE_SCN_MEM_READ != 0
    }

    pub fn writable(&self) -> bool {
        self.characteristics & IMAGE_SCN_MEM_WRITE != 0
    }

    pub fn executable(&self) -> bool {
        self.characteristics & IMAGE_SCN_MEM_EXECUTE != 0
    }

    pub fn code(&self) -> bool {
        self.characteristics & IMAGE_SCN_CNT_CODE != 0
    }
}

/// Member access as stored in the snapshot (1 private, 2 protected, 3 public).
pub type Access = u32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UdtMember {
    pub udt_id: u32,
    pub udt_name: String,
    pub id: u32,
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_name: String,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub length: u64,
    #[serde(default)]
    pub access: Access,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_virtual: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumValue {
    pub enum_id: u32,
    pub enum_name: String,
    pub id: u32,
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseClass {
    pub derived_id: u32,
    pub derived_name: String,
    pub base_id: u32,
    pub base_name: String,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub is_virtual: bool,
    #[serde(default)]
    pub access: Access,
}

/// Whether a function-scoped variable is a local or a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarKind {
    Local,
    Param,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub func_id: u32,
    pub func_name: String,
    pub id: u32,
    pub name: String,
    pub kind: VarKind,
    #[serde(rename = "type", default)]
    pub type_name: String,
    #[serde(default)]
    pub location_type: u32,
    #[serde(default)]
    pub offset_or_register: i64,
}

/// Complete snapshot as stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub symbols: Vec<Symbol>,
    pub compilands: Option<Vec<Compiland>>,
    pub source_files: Option<Vec<SourceFile>>,
    pub line_numbers: Option<Vec<LineNumber>>,
    pub sections: Option<Vec<Section>>,
    pub udt_members: Option<Vec<UdtMember>>,
    pub enum_values: Option<Vec<EnumValue>>,
    pub base_classes: Option<Vec<BaseClass>>,
    pub variables: Option<Vec<Variable>>,
}
