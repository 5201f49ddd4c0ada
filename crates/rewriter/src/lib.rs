//! Static binary rewriter for x86-64 ELF executables
//!
//! The rewrite pipeline:
//!
//! 1. [`elf::read_text`] pulls the `.text` section out of the input.
//! 2. [`recover`] decodes it and carves it into layout pairs.
//! 3. A transformation pass marks blocks (this crate ships only the
//!    identity pass and a mark-everything knob; real passes plug in
//!    between recovery and layout).
//! 4. `layout` assigns every block an address; `isa-x86` assembles the
//!    relocated ones.
//! 5. [`patch`] produces the patched `.text` and the fresh code region;
//!    [`elf::emit_rewritten`] splices both into a new ELF with one appended
//!    PT_LOAD segment.

pub mod elf;
pub mod error;
pub mod patch;
pub mod recover;

use layout::{
    ConcreteAddr, Diagnostic, Grouping, InjectedCode, LayoutInput, LayoutSession, LayoutStrategy,
    MemoryView, SegmentId, SymbolSource, TrampolineStrategy,
};

use isa_x86::X86;

pub use error::{RewriteError, RewriteResult};

/// The address space tag used for the whole output image (original `.text`
/// and fresh region share one virtual address space).
pub const TEXT_SEGMENT: SegmentId = SegmentId(0);

/// Options for one rewrite.
#[derive(Debug, Clone)]
pub struct RewriteOptions {
    pub strategy: LayoutStrategy,
    /// Mark every recovered block `Modified`. Without a real transformation
    /// pass this exercises the full relocation path; with it off the rewrite
    /// is the identity.
    pub force_all: bool,
    /// Raw payloads to inject into the fresh region.
    pub injected: Vec<Vec<u8>>,
}

/// A finished rewrite: the output image plus the layout diagnostics.
#[derive(Debug)]
pub struct RewriteOutcome {
    pub bytes: Vec<u8>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Memory view over the input's `.text` mapping.
struct TextImage {
    start: u64,
    len: u64,
}

impl MemoryView for TextImage {
    fn resolve_absolute(&self, addr: u64) -> Option<ConcreteAddr> {
        (self.start..self.start + self.len)
            .contains(&addr)
            .then(|| ConcreteAddr::new(TEXT_SEGMENT, addr))
    }
}

/// Rewrite `input` (a 64-bit x86 ELF executable) according to `options`.
pub fn rewrite(input: &[u8], options: &RewriteOptions) -> RewriteResult<RewriteOutcome> {
    let text = elf::read_text(input)?;
    let layout_base = elf::choose_layout_base(input)?;
    let base = ConcreteAddr::new(TEXT_SEGMENT, text.vaddr);
    let mem = TextImage {
        start: text.vaddr,
        len: text.data.len() as u64,
    };

    let mut symbols = SymbolSource::new();
    let mut pairs = recover::recover_blocks(&text.data, base, &mem, &mut symbols)?;
    if options.force_all {
        for pair in &mut pairs {
            pair.status = layout::BlockStatus::Modified;
        }
    }

    let wto = (options.strategy.grouping == Grouping::Loop)
        .then(|| recover::build_wto(&pairs, &mem));
    let needs_functions = options.strategy.grouping == Grouping::Function
        || options.strategy.trampolines == TrampolineStrategy::WholeFunction;
    let functions = if needs_functions {
        let entries = elf::function_entries(input)?;
        Some(recover::build_function_map(&entries, &pairs))
    } else {
        None
    };

    let injected: Vec<InjectedCode> = options
        .injected
        .iter()
        .map(|bytes| InjectedCode {
            symbol: symbols.fresh(),
            bytes: bytes.clone(),
        })
        .collect();

    let isa = X86;
    let mut session = LayoutSession::new(&isa, &mem, options.strategy);
    let result = session.run(LayoutInput {
        pairs,
        injected,
        layout_base: ConcreteAddr::new(TEXT_SEGMENT, layout_base),
        wto,
        functions,
    });
    let diagnostics = session.diagnostics().to_vec();
    let layout = result?;

    let image = patch::apply(&layout, &text.data, text.vaddr, layout_base)?;
    let bytes = elf::emit_rewritten(input, &text, &image.text, &image.fresh, layout_base)?;

    Ok(RewriteOutcome { bytes, diagnostics })
}
