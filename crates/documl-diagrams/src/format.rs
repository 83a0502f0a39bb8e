//! Output image formats for rendered diagrams.

/// Output image formats produced by the `PlantUML` renderer.
///
/// Each format drives an independent rendering pipeline; registry state is
/// never shared between formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// PNG bitmap output.
    Bitmap,
    /// SVG vector output.
    Vector,
    /// Encapsulated PostScript output (subject to the optional PDF post-pass).
    Eps,
}

impl OutputFormat {
    /// All formats, in dispatch order.
    pub const ALL: [Self; 3] = [Self::Bitmap, Self::Vector, Self::Eps];

    /// Renderer output-type flag value (`-t<flag>`).
    #[must_use]
    pub fn type_flag(self) -> &'static str {
        match self {
            Self::Bitmap => "png",
            Self::Vector => "svg",
            Self::Eps => "eps",
        }
    }

    /// File extension of images rendered in this format.
    #[must_use]
    pub fn extension(self) -> &'static str {
        self.type_flag()
    }
}
