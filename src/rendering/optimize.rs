/// SVG normalization pass run before rasterization

use regex::Regex;
use usvg::{Options, Tree, WriteOptions};

use crate::{Error, Result};

const PRECISION: u8 = 3;

/// Parses an SVG document with `usvg` and writes it back out in a compact,
/// canonical form: resolved styles, rounded coordinates, no inter-tag
/// whitespace. Also owns the parse options (and font database) used for the
/// final rasterization.
pub struct SvgOptimizer {
    options: Options<'static>,
    write: WriteOptions,
    whitespace: Regex,
}

impl SvgOptimizer {
    pub fn new(load_system_fonts: bool) -> Result<Self> {
        let mut options = Options::default();
        if load_system_fonts {
            options.fontdb_mut().load_system_fonts();
        }
        let write = WriteOptions {
            coordinates_precision: PRECISION,
            transforms_precision: PRECISION,
            ..WriteOptions::default()
        };
        let whitespace =
            Regex::new(r">\s+<").map_err(|e| Error::Other(format!("Invalid whitespace pattern: {}", e)))?;

        Ok(Self {
            options,
            write,
            whitespace,
        })
    }

    pub fn options(&self) -> &Options<'static> {
        &self.options
    }

    pub fn parse(&self, svg: &str) -> Result<Tree> {
        Tree::from_str(svg, &self.options).map_err(|e| Error::RenderError(format!("Invalid SVG: {}", e)))
    }

    pub fn optimize(&self, svg: &str) -> Result<String> {
        let tree = self.parse(svg)?;
        let written = tree.to_string(&self.write);
        Ok(self.whitespace.replace_all(written.trim(), "><").into_owned())
    }
}
