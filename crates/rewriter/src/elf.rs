//! ELF access
//!
//! Reading goes through the `object` crate; emission is raw ELF64 byte
//! surgery: the `.text` file range is replaced with the patched image and
//! one PT_LOAD (R+X) segment is appended for the fresh code region. The
//! program-header table cannot grow in place, so it is relocated into the
//! appended segment and the ELF header is pointed at the new table.

use object::{Object, ObjectSection, ObjectSegment, ObjectSymbol};
use thiserror::Error;

/// Errors from ELF reading and emission
#[derive(Debug, Error)]
pub enum ElfError {
    #[error("failed to parse ELF: {0}")]
    Parse(#[from] object::read::Error),

    #[error("no .text section in input")]
    MissingText,

    #[error("not a 64-bit little-endian ELF")]
    UnsupportedImage,

    #[error("malformed program header table")]
    MalformedHeaders,
}

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;

// ELF header field offsets
const E_PHOFF: usize = 0x20;
const E_PHENTSIZE: usize = 0x36;
const E_PHNUM: usize = 0x38;

// Program header layout (Elf64_Phdr)
const PHENT_SIZE: usize = 56;
const P_TYPE: usize = 0x00;
const P_FLAGS: usize = 0x04;
const P_OFFSET: usize = 0x08;
const P_VADDR: usize = 0x10;
const P_PADDR: usize = 0x18;
const P_FILESZ: usize = 0x20;
const P_MEMSZ: usize = 0x28;
const P_ALIGN: usize = 0x30;

const PT_LOAD: u32 = 1;
const PT_PHDR: u32 = 6;
const PF_X: u32 = 1;
const PF_R: u32 = 4;

const PAGE: u64 = 0x1000;

/// The input's `.text` section: contents plus where it lives.
#[derive(Debug, Clone)]
pub struct TextSection {
    pub vaddr: u64,
    pub file_offset: u64,
    pub data: Vec<u8>,
}

/// Locate and copy the `.text` section of `elf`.
pub fn read_text(elf: &[u8]) -> Result<TextSection, ElfError> {
    let file = object::File::parse(elf)?;
    let section = file.section_by_name(".text").ok_or(ElfError::MissingText)?;
    let (file_offset, _) = section.file_range().ok_or(ElfError::MissingText)?;
    Ok(TextSection {
        vaddr: section.address(),
        file_offset,
        data: section.data()?.to_vec(),
    })
}

/// Function entry addresses from the symbol table, sorted ascending.
pub fn function_entries(elf: &[u8]) -> Result<Vec<u64>, ElfError> {
    let file = object::File::parse(elf)?;
    let mut entries: Vec<u64> = file
        .symbols()
        .filter(|symbol| symbol.kind() == object::SymbolKind::Text && symbol.size() > 0)
        .map(|symbol| symbol.address())
        .collect();
    entries.sort_unstable();
    entries.dedup();
    Ok(entries)
}

/// First page-aligned address past every loadable segment: where the fresh
/// code region goes.
pub fn choose_layout_base(elf: &[u8]) -> Result<u64, ElfError> {
    let file = object::File::parse(elf)?;
    let end = file
        .segments()
        .map(|segment| segment.address() + segment.size())
        .max()
        .unwrap_or(0);
    Ok((end + PAGE - 1) & !(PAGE - 1))
}

/// Emit the rewritten ELF: `patched_text` replaces the `.text` file range,
/// and `fresh` (mapped at `layout_base`) is appended as a new PT_LOAD
/// segment together with the relocated program-header table.
pub fn emit_rewritten(
    input: &[u8],
    text: &TextSection,
    patched_text: &[u8],
    fresh: &[u8],
    layout_base: u64,
) -> Result<Vec<u8>, ElfError> {
    if input.len() < 0x40
        || input[..4] != ELF_MAGIC
        || input[4] != ELFCLASS64
        || input[5] != ELFDATA2LSB
    {
        return Err(ElfError::UnsupportedImage);
    }
    if patched_text.len() != text.data.len() {
        return Err(ElfError::MalformedHeaders);
    }

    let mut out = input.to_vec();
    let text_range = text.file_offset as usize..text.file_offset as usize + patched_text.len();
    out.get_mut(text_range)
        .ok_or(ElfError::MalformedHeaders)?
        .copy_from_slice(patched_text);

    if fresh.is_empty() {
        return Ok(out);
    }

    let phoff = read_u64(&out, E_PHOFF) as usize;
    let phentsize = read_u16(&out, E_PHENTSIZE) as usize;
    let phnum = read_u16(&out, E_PHNUM) as usize;
    if phentsize != PHENT_SIZE {
        return Err(ElfError::UnsupportedImage);
    }
    let old_table = out
        .get(phoff..phoff + phnum * PHENT_SIZE)
        .ok_or(ElfError::MalformedHeaders)?
        .to_vec();

    // The new segment's file offset must be congruent to its vaddr modulo
    // the page size.
    let mut seg_offset = out.len() as u64;
    seg_offset += layout_base.wrapping_sub(seg_offset) & (PAGE - 1);
    out.resize(seg_offset as usize, 0);
    out.extend_from_slice(fresh);

    // Relocated program-header table, 8-byte aligned, inside the new
    // segment so PT_PHDR consumers can still find it in memory.
    let table_offset = (out.len() + 7) & !7;
    out.resize(table_offset, 0);
    let table_vaddr = layout_base + (table_offset as u64 - seg_offset);

    out.extend_from_slice(&old_table);
    let seg_size = (table_offset as u64 - seg_offset) + ((phnum + 1) * PHENT_SIZE) as u64;
    let mut load = [0u8; PHENT_SIZE];
    write_u32(&mut load, P_TYPE, PT_LOAD);
    write_u32(&mut load, P_FLAGS, PF_R | PF_X);
    write_u64(&mut load, P_OFFSET, seg_offset);
    write_u64(&mut load, P_VADDR, layout_base);
    write_u64(&mut load, P_PADDR, layout_base);
    write_u64(&mut load, P_FILESZ, seg_size);
    write_u64(&mut load, P_MEMSZ, seg_size);
    write_u64(&mut load, P_ALIGN, PAGE);
    out.extend_from_slice(&load);

    // Point PT_PHDR (if any) at the relocated table.
    for index in 0..phnum {
        let entry = table_offset + index * PHENT_SIZE;
        if read_u32(&out, entry + P_TYPE) == PT_PHDR {
            write_u64(&mut out, entry + P_OFFSET, table_offset as u64);
            write_u64(&mut out, entry + P_VADDR, table_vaddr);
            write_u64(&mut out, entry + P_PADDR, table_vaddr);
            let table_size = ((phnum + 1) * PHENT_SIZE) as u64;
            write_u64(&mut out, entry + P_FILESZ, table_size);
            write_u64(&mut out, entry + P_MEMSZ, table_size);
        }
    }

    write_u64(&mut out, E_PHOFF, table_offset as u64);
    write_u16(&mut out, E_PHNUM, (phnum + 1) as u16);
    Ok(out)
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(raw)
}

fn write_u32(bytes: &mut [u8], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

fn write_u64(bytes: &mut [u8], offset: usize, value: u64) {
    bytes[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

fn write_u16(bytes: &mut [u8], offset: usize, value: u16) {
    bytes[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}
