use async_trait::async_trait;

use ctxgen_shared::{Result, Source, SourceKind};

use crate::{FetchContext, SourceFetcher, type_mismatch};

/// `text`: the inline `content`, verbatim.
pub struct TextFetcher;

#[async_trait]
impl SourceFetcher for TextFetcher {
    fn source_type(&self) -> &'static str {
        "text"
    }

    async fn fetch(&self, source: &Source, _ctx: &FetchContext) -> Result<String> {
        match &source.kind {
            SourceKind::Text(text) => Ok(text.content.clone()),
            _ => Err(type_mismatch(self.source_type(), source)),
        }
    }
}
