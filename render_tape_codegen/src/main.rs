// Copyright 2026 the Render Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![doc = "Code generator for `render_tape` opcode tables.\n\n\
          Reads `render_tape/opcodes.json` and writes `render_tape/src/opcodes_gen.rs`.\n\
          This is a std-only build tool crate. It is not shipped as part of the core VM.\n"]

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail, ensure};
use serde::Deserialize;

/// The whole of `opcodes.json`.
#[derive(Deserialize, Clone)]
struct OpcodeTable {
    version: u32,
    opcodes: Vec<OpcodeDef>,
}

#[derive(Deserialize, Clone)]
struct OpcodeDef {
    name: String,
    mnemonic: String,
    byte: String,
    terminator: bool,
    flags: Vec<String>,
    doc: Option<String>,
    operands: Vec<OperandDef>,
}

#[derive(Deserialize, Clone)]
struct OperandDef {
    kind: String,
    role: String,
}

/// An opcode with its byte decoded.
struct Entry {
    byte: u8,
    def: OpcodeDef,
}

impl Entry {
    fn is_jump(&self) -> bool {
        self.def.flags.iter().any(|f| f == "jump")
    }
}

/// Every instruction is four `u32` slots: the opcode and three operands.
const MAX_OPERANDS: usize = 3;

/// Operand kinds: JSON name, Rust variant, doc line.
const OPERAND_KINDS: &[(&str, &str, &str)] = &[
    ("offset", "Offset", "A relative instruction offset patched from a label."),
    ("imm", "Imm", "An immediate unsigned integer."),
    ("flag", "Flag", "An immediate boolean (`0` or `1`)."),
    ("register", "Register", "A register identifier."),
    ("symbol", "Symbol", "A scope symbol slot."),
    ("primitive", "Primitive", "An encoded primitive literal."),
    ("const_string", "ConstString", "A string constant index."),
    ("const_array", "ConstArray", "An array constant index."),
    ("const_other", "ConstOther", "An opaque constant index."),
    ("const_serializable", "ConstSerializable", "A serializable constant index."),
];

const HEADER: &str = "\
// Copyright 2026 the Render Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// @generated by render_tape_codegen. Do not edit by hand.

";

const SCHEMA_TYPES: &str = r##"/// Operand schema metadata (kind/role).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OperandSchema {
    /// Operand kind (semantic type).
    pub kind: OperandKind,
    /// Operand role (how this operand is used).
    pub role: OperandRole,
}

impl OperandSchema {
    const fn new(kind: OperandKind, role: OperandRole) -> Self {
        Self { kind, role }
    }
}

/// Per-opcode metadata used by the assembler, VM and disassembler.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OpcodeInfo {
    /// Stable, parseable opcode name.
    pub mnemonic: &'static str,
    /// Whether control never falls through to the next instruction.
    pub is_terminator: bool,
    /// Optional per-opcode traits.
    pub flags: OpcodeFlags,
    /// Operand schemas, in slot order.
    pub operands: &'static [OperandSchema],
}

/// Optional per-opcode traits.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(transparent)]
pub struct OpcodeFlags(u8);

impl OpcodeFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// The first operand is a label-relative offset.
    pub const JUMP: Self = Self(1 << 0);

    /// Returns `true` if `other` is a subset of `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

"##;

const OPCODE_ACCESSORS: &str = r##"
    /// Returns `true` if control never falls through this opcode.
    #[must_use]
    pub fn is_terminator(self) -> bool {
        self.info().is_terminator
    }

    /// Stable, parseable opcode name.
    ///
    /// This string is used by the disassembler output.
    #[must_use]
    pub fn mnemonic(self) -> &'static str {
        self.info().mnemonic
    }

    /// Returns opcode metadata for this opcode.
    #[must_use]
    pub fn info(self) -> &'static OpcodeInfo {
        &OPCODE_INFO_BY_BYTE[usize::from(self as u8)]
    }

    /// Returns `true` if the first operand is patched from a label.
    #[must_use]
    pub fn is_jump(self) -> bool {
        self.info().flags.contains(OpcodeFlags::JUMP)
    }

    /// Returns operand schema descriptors for this opcode.
    #[must_use]
    pub fn operands(self) -> &'static [OperandSchema] {
        self.info().operands
    }
}
"##;

fn parse_byte(s: &str) -> Result<u8> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u8::from_str_radix(digits, 16).with_context(|| format!("invalid opcode byte '{s}'"))
}

fn kind_variant(kind: &str) -> Result<&'static str> {
    OPERAND_KINDS
        .iter()
        .find(|(json, ..)| *json == kind)
        .map(|(_, variant, _)| *variant)
        .with_context(|| format!("unknown operand kind '{kind}'"))
}

/// `bind_caller` -> `BindCaller`.
fn role_variant(role: &str) -> String {
    role.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect()
}

/// Decodes, orders and checks the table.
fn entries(table: OpcodeTable) -> Result<Vec<Entry>> {
    ensure!(
        table.version == 1,
        "unsupported opcodes.json version {}",
        table.version
    );
    let mut entries = table
        .opcodes
        .into_iter()
        .map(|def| {
            let byte = parse_byte(&def.byte)?;
            Ok(Entry { byte, def })
        })
        .collect::<Result<Vec<_>>>()?;
    entries.sort_by(|a, b| a.byte.cmp(&b.byte).then_with(|| a.def.name.cmp(&b.def.name)));

    for pair in entries.windows(2) {
        let [a, b] = pair else { continue };
        ensure!(
            a.byte != b.byte,
            "duplicate opcode byte 0x{:02X}: {} and {}",
            a.byte,
            a.def.name,
            b.def.name
        );
    }
    let mut names: Vec<&str> = entries.iter().map(|e| e.def.name.as_str()).collect();
    names.sort_unstable();
    if let Some(pair) = names.windows(2).find(|pair| pair[0] == pair[1]) {
        bail!("duplicate opcode name '{}'", pair[0]);
    }

    for entry in &entries {
        let def = &entry.def;
        ensure!(
            def.operands.len() <= MAX_OPERANDS,
            "opcode {} has {} operands (max {MAX_OPERANDS})",
            def.name,
            def.operands.len()
        );
        if let Some(flag) = def.flags.iter().find(|f| *f != "jump") {
            bail!("unknown flag '{flag}' on opcode {}", def.name);
        }
        let leads_with_offset = def.operands.first().is_some_and(|o| o.kind == "offset");
        ensure!(
            entry.is_jump() == leads_with_offset,
            "opcode {}: the `jump` flag requires the first operand to be an offset",
            def.name
        );
        for operand in &def.operands {
            kind_variant(&operand.kind)?;
        }
    }
    Ok(entries)
}

fn emit_operand_kinds(out: &mut String) -> Result<()> {
    out.push_str("/// Operand kinds used by the opcode table.\n");
    out.push_str("#[derive(Copy, Clone, Debug, PartialEq, Eq)]\n");
    out.push_str("pub enum OperandKind {\n");
    for (_, variant, doc) in OPERAND_KINDS {
        writeln!(out, "    /// {doc}\n    {variant},")?;
    }
    out.push_str("}\n\n");
    Ok(())
}

fn emit_operand_roles(out: &mut String, entries: &[Entry]) -> Result<()> {
    let mut roles: Vec<String> = Vec::new();
    for operand in entries.iter().flat_map(|e| &e.def.operands) {
        let role = role_variant(&operand.role);
        if !roles.contains(&role) {
            roles.push(role);
        }
    }
    out.push_str("/// Operand roles used by the opcode table.\n///\n");
    out.push_str("/// Roles are a best-effort description for disassembly/tooling.\n");
    out.push_str("#[allow(missing_docs, reason = \"generated\")]\n");
    out.push_str("#[derive(Copy, Clone, Debug, PartialEq, Eq)]\n");
    out.push_str("pub enum OperandRole {\n");
    for role in &roles {
        writeln!(out, "    {role},")?;
    }
    out.push_str("}\n\n");
    Ok(())
}

/// One row per byte up to the highest assigned one; gaps decode as `<invalid>`.
fn emit_info_table(out: &mut String, entries: &[Entry]) -> Result<()> {
    out.push_str("/// Metadata indexed by opcode byte.\n");
    out.push_str("pub const OPCODE_INFO_BY_BYTE: &[OpcodeInfo] = &[\n");
    let top = entries.last().map_or(0, |e| e.byte);
    let mut assigned = entries.iter().peekable();
    for byte in 0..=top {
        let Some(entry) = assigned.next_if(|e| e.byte == byte) else {
            writeln!(
                out,
                "    // 0x{byte:02X}\n    OpcodeInfo {{ mnemonic: \"<invalid>\", is_terminator: false, flags: OpcodeFlags::NONE, operands: &[] }},"
            )?;
            continue;
        };
        let def = &entry.def;
        let flags = if entry.is_jump() {
            "OpcodeFlags::JUMP"
        } else {
            "OpcodeFlags::NONE"
        };
        let operands = def
            .operands
            .iter()
            .map(|o| {
                Ok(format!(
                    "OperandSchema::new(OperandKind::{}, OperandRole::{})",
                    kind_variant(&o.kind)?,
                    role_variant(&o.role)
                ))
            })
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        writeln!(
            out,
            "    // 0x{byte:02X} {}\n    OpcodeInfo {{ mnemonic: \"{}\", is_terminator: {}, flags: {flags}, operands: &[{operands}] }},",
            def.name, def.mnemonic, def.terminator
        )?;
    }
    out.push_str("];\n\n");
    Ok(())
}

fn emit_opcode_enum(out: &mut String, entries: &[Entry]) -> Result<()> {
    out.push_str("/// Opcode byte for the template instruction set.\n");
    out.push_str("#[derive(Copy, Clone, Debug, PartialEq, Eq)]\n#[repr(u8)]\n");
    out.push_str("pub enum Opcode {\n");
    for Entry { byte, def } in entries {
        let doc = def
            .doc
            .as_deref()
            .with_context(|| format!("missing doc for opcode {}", def.name))?;
        for line in doc.lines() {
            writeln!(out, "    /// {line}")?;
        }
        writeln!(out, "    {} = 0x{byte:02X},", def.name)?;
    }
    out.push_str("}\n\n");

    out.push_str("impl Opcode {\n");
    out.push_str("    /// Decodes an opcode slot.\n    #[must_use]\n");
    out.push_str("    pub fn from_u32(raw: u32) -> Option<Self> {\n        Some(match raw {\n");
    for Entry { byte, def } in entries {
        writeln!(out, "            0x{byte:02X} => Self::{},", def.name)?;
    }
    out.push_str("            _ => return None,\n        })\n    }\n");
    out.push_str(OPCODE_ACCESSORS);
    Ok(())
}

fn generate(table: OpcodeTable) -> Result<String> {
    let entries = entries(table)?;
    let mut out = String::from(HEADER);
    emit_operand_kinds(&mut out)?;
    emit_operand_roles(&mut out, &entries)?;
    out.push_str(SCHEMA_TYPES);
    emit_info_table(&mut out, &entries)?;
    emit_opcode_enum(&mut out, &entries)?;
    Ok(out)
}

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let table_path = PathBuf::from(
        args.next()
            .unwrap_or_else(|| "render_tape/opcodes.json".to_owned()),
    );
    let out_path = PathBuf::from(
        args.next()
            .unwrap_or_else(|| "render_tape/src/opcodes_gen.rs".to_owned()),
    );
    if args.next().is_some() {
        bail!("usage: render_tape_codegen [opcodes.json] [opcodes_gen.rs]");
    }

    let json = fs::read_to_string(&table_path)
        .with_context(|| format!("read {}", table_path.display()))?;
    let table: OpcodeTable =
        serde_json::from_str(&json).with_context(|| format!("parse {}", table_path.display()))?;
    let rendered = generate(table)?;

    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(&out_path, rendered).with_context(|| format!("write {}", out_path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn workspace_root() -> &'static Path {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .expect("workspace root")
    }

    fn load_table() -> OpcodeTable {
        let json = fs::read_to_string(workspace_root().join("render_tape/opcodes.json"))
            .expect("read opcodes.json");
        serde_json::from_str(&json).expect("parse opcodes.json")
    }

    #[test]
    fn generated_file_is_up_to_date() {
        let rendered = generate(load_table()).expect("render opcodes_gen.rs");
        let existing = fs::read_to_string(workspace_root().join("render_tape/src/opcodes_gen.rs"))
            .expect("read opcodes_gen.rs");
        // git autocrlf may check the file out with `\r\n`.
        assert_eq!(
            rendered,
            existing.replace("\r\n", "\n"),
            "opcodes_gen.rs is out of date; re-run: cargo run -p render_tape_codegen"
        );
    }

    #[test]
    fn duplicate_bytes_are_rejected() {
        let mut table = load_table();
        let mut dup = table.opcodes[1].clone();
        dup.byte = table.opcodes[0].byte.clone();
        dup.name = "Twin".to_owned();
        table.opcodes.push(dup);
        let err = generate(table).unwrap_err();
        assert!(err.to_string().contains("duplicate opcode byte"), "{err}");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut table = load_table();
        let mut dup = table.opcodes[0].clone();
        dup.byte = "0xFF".to_owned();
        table.opcodes.push(dup);
        let err = generate(table).unwrap_err();
        assert!(err.to_string().contains("duplicate opcode name"), "{err}");
    }

    #[test]
    fn jump_flag_requires_offset_operand() {
        let mut table = load_table();
        let nop = table
            .opcodes
            .iter_mut()
            .find(|o| o.name == "Nop")
            .expect("nop opcode");
        nop.flags.push("jump".to_owned());
        let err = generate(table).unwrap_err();
        assert!(err.to_string().contains("offset"), "{err}");
    }

    #[test]
    fn unknown_operand_kinds_are_rejected() {
        let mut table = load_table();
        table.opcodes[0].operands.push(OperandDef {
            kind: "float".to_owned(),
            role: "value".to_owned(),
        });
        let err = generate(table).unwrap_err();
        assert!(err.to_string().contains("unknown operand kind"), "{err}");
    }

    #[test]
    fn roles_become_camel_case_variants() {
        assert_eq!(role_variant("bind_caller"), "BindCaller");
        assert_eq!(role_variant("reg"), "Reg");
    }
}
