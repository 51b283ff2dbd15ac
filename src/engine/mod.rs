pub mod external;
pub mod types;

use anyhow::Result;
use std::path::Path;

pub use types::{EngineDiag, PageImage, ToolDiag};

pub trait Engine {
    fn doctor(&self) -> Result<EngineDiag>;
    /// Rasterize `first_page..=last_page` into `out_dir`, sorted by page.
    fn render_pages(
        &self,
        input: &Path,
        first_page: u32,
        last_page: u32,
        out_dir: &Path,
    ) -> Result<Vec<PageImage>>;
    fn recognize(&self, image: &PageImage) -> Result<String>;
}
