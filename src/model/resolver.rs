use crate::model::catalog::{self, CatalogEntry, Variant};

/// Everything a caller can use to pick an adapter, in precedence order.
#[derive(Debug, Default, Clone, Copy)]
pub struct AdapterSignals<'a> {
    /// `?lora=` query parameter.
    pub query_lora: Option<&'a str>,
    /// `X-LoRA-Module` header.
    pub header_lora: Option<&'a str>,
    /// `lora` body field.
    pub body_lora: Option<&'a str>,
    /// `model` body field, matched against public model names.
    pub body_model: Option<&'a str>,
}

#[derive(Clone, Copy)]
enum Signal<'a> {
    Adapter(&'a str),
    ModelName(&'a str),
}

impl<'a> AdapterSignals<'a> {
    fn ordered(&self) -> [Option<Signal<'a>>; 4] {
        [
            present(self.query_lora).map(Signal::Adapter),
            present(self.header_lora).map(Signal::Adapter),
            present(self.body_lora).map(Signal::Adapter),
            present(self.body_model).map(Signal::ModelName),
        ]
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Picks the variant a request targets. The first present signal decides;
/// a token that names nothing in the catalog resolves to the base model.
pub fn resolve(signals: &AdapterSignals<'_>) -> Variant {
    let Some(signal) = signals.ordered().into_iter().flatten().next() else {
        return Variant::Base;
    };

    let matches = |entry: &&CatalogEntry| match signal {
        Signal::Adapter(token) => entry.adapter == Some(token),
        Signal::ModelName(name) => entry.model_name == name,
    };

    catalog::entries()
        .iter()
        .find(matches)
        .map(|entry| entry.variant)
        .unwrap_or(Variant::Base)
}
