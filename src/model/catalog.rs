/// A simulated model configuration selectable per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Variant {
    Base,
    LoraA,
    LoraB,
}

/// One row of the response catalog.
#[derive(Debug)]
pub struct CatalogEntry {
    pub variant: Variant,
    /// Token callers use to select the adapter; `None` for the base model.
    pub adapter: Option<&'static str>,
    pub model_name: &'static str,
    pub text: &'static str,
}

static ENTRIES: [CatalogEntry; 3] = [
    CatalogEntry {
        variant: Variant::Base,
        adapter: None,
        model_name: "fake-llm",
        text: "This is the base fake LLM response. Hello, world!",
    },
    CatalogEntry {
        variant: Variant::LoraA,
        adapter: Some("lora-a"),
        model_name: "fake-llm-lora-a",
        text: "This is fake LLM with LoRA-A. Greetings from module A!",
    },
    CatalogEntry {
        variant: Variant::LoraB,
        adapter: Some("lora-b"),
        model_name: "fake-llm-lora-b",
        text: "This is fake LLM with LoRA-B. Salutations from module B!",
    },
];

pub fn entries() -> &'static [CatalogEntry] {
    &ENTRIES
}

/// Canned payload for a variant.
pub fn lookup(variant: Variant) -> &'static CatalogEntry {
    ENTRIES
        .iter()
        .find(|entry| entry.variant == variant)
        .unwrap_or(&ENTRIES[0])
}

/// Number of adapters the server advertises as loadable.
pub fn max_lora() -> usize {
    ENTRIES.iter().filter(|entry| entry.adapter.is_some()).count()
}
