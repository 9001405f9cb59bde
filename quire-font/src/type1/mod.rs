/*!
An interpreter for Type 1 charstrings.

A charstring arrives here as a flat token sequence (numbers and commands)
with subroutine calls already inlined. [`Type1CharString`] holds that
sequence and renders it to an outline on first use; the result is memoized,
so repeated path, width and bounds queries interpret the sequence only
once.

Accented characters built with `seac` pull their components from the
owning font through [`Type1CharStringReader`]. A component chain that runs
back into a glyph already being rendered is abandoned with a warning
instead of recursing forever.
*/

use crate::Error;
use kurbo::{BezPath, Rect, Shape};
use smallvec::SmallVec;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering};

mod interp;
mod standard;

/// One element of a charstring sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token {
    /// An operand.
    Number(f32),
    /// An operator.
    Command(Command),
}

/// A Type 1 charstring operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    RMoveTo,
    VMoveTo,
    HMoveTo,
    RLineTo,
    HLineTo,
    VLineTo,
    RrCurveTo,
    VhCurveTo,
    HvCurveTo,
    ClosePath,
    Hsbw,
    Sbw,
    Seac,
    Div,
    CallOtherSubr,
    SetCurrentPoint,
    HStem,
    VStem,
    HStem3,
    VStem3,
    DotSection,
    EndChar,
    CallSubr,
    Return,
}

/// Access to the charstrings of the owning font, used to resolve the
/// components of accented characters.
pub trait Type1CharStringReader {
    /// The charstring for the glyph with the given name.
    fn type1_charstring(&self, glyph_name: &str) -> Result<&Type1CharString, Error>;
}

/// The glyph names currently being rendered, outermost first.
pub(crate) type RenderChain = SmallVec<[String; 4]>;

/// The output of interpreting a charstring.
#[derive(Debug)]
pub(crate) struct Rendered {
    pub(crate) path: BezPath,
    pub(crate) width: f32,
}

/// A single glyph's charstring, rendered lazily.
#[derive(Debug)]
pub struct Type1CharString {
    font_name: String,
    glyph_name: String,
    tokens: Vec<Token>,
    rendered: OnceLock<Rendered>,
    render_passes: AtomicU32,
}

impl Type1CharString {
    /// A charstring from its token sequence. Subroutine calls must already
    /// be inlined.
    pub fn new(
        font_name: impl Into<String>,
        glyph_name: impl Into<String>,
        tokens: Vec<Token>,
    ) -> Self {
        Self {
            font_name: font_name.into(),
            glyph_name: glyph_name.into(),
            tokens,
            rendered: OnceLock::new(),
            render_passes: AtomicU32::new(0),
        }
    }

    /// The glyph name.
    pub fn name(&self) -> &str {
        &self.glyph_name
    }

    /// The glyph outline.
    pub fn path(&self, font: &dyn Type1CharStringReader) -> &BezPath {
        &self.rendered(font).path
    }

    /// The advance width.
    pub fn width(&self, font: &dyn Type1CharStringReader) -> f32 {
        self.rendered(font).width
    }

    /// The bounding box of the outline.
    pub fn bounds(&self, font: &dyn Type1CharStringReader) -> Rect {
        self.rendered(font).path.bounding_box()
    }

    /// How many times the token sequence has actually been interpreted.
    pub fn render_passes(&self) -> u32 {
        self.render_passes.load(Ordering::Relaxed)
    }

    fn rendered(&self, font: &dyn Type1CharStringReader) -> &Rendered {
        let mut chain = RenderChain::new();

        self.rendered_nested(font, &mut chain)
    }

    /// Render with an explicit chain of in-progress glyph names, so that
    /// component resolution can refuse to re-enter a glyph.
    pub(crate) fn rendered_nested(
        &self,
        font: &dyn Type1CharStringReader,
        chain: &mut RenderChain,
    ) -> &Rendered {
        self.rendered.get_or_init(|| {
            self.render_passes.fetch_add(1, Ordering::Relaxed);
            chain.push(self.glyph_name.clone());
            let rendered = interp::render(self, font, chain);
            chain.pop();

            rendered
        })
    }

    pub(crate) fn font_name(&self) -> &str {
        &self.font_name
    }

    pub(crate) fn tokens(&self) -> &[Token] {
        &self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::{Command, Token, Type1CharString, Type1CharStringReader};
    use crate::Error;
    use kurbo::PathEl;
    use rustc_hash::FxHashMap;

    pub(super) struct TestFont {
        glyphs: FxHashMap<String, Type1CharString>,
    }

    impl TestFont {
        pub(super) fn new(glyphs: Vec<Type1CharString>) -> Self {
            Self {
                glyphs: glyphs
                    .into_iter()
                    .map(|g| (g.name().to_string(), g))
                    .collect(),
            }
        }

        pub(super) fn glyph(&self, name: &str) -> &Type1CharString {
            &self.glyphs[name]
        }
    }

    impl Type1CharStringReader for TestFont {
        fn type1_charstring(&self, glyph_name: &str) -> Result<&Type1CharString, Error> {
            self.glyphs.get(glyph_name).ok_or(Error::MissingGlyph)
        }
    }

    pub(super) fn n(value: f32) -> Token {
        Token::Number(value)
    }

    pub(super) fn c(command: Command) -> Token {
        Token::Command(command)
    }

    fn square_glyph(name: &str) -> Type1CharString {
        Type1CharString::new(
            "TestFont",
            name,
            vec![
                n(50.0),
                n(600.0),
                c(Command::Hsbw),
                n(0.0),
                n(0.0),
                c(Command::RMoveTo),
                n(100.0),
                n(0.0),
                c(Command::RLineTo),
                n(0.0),
                n(100.0),
                c(Command::RLineTo),
                c(Command::ClosePath),
                c(Command::EndChar),
            ],
        )
    }

    #[test]
    fn outline_and_width() {
        let font = TestFont::new(vec![square_glyph("square")]);
        let glyph = font.glyph("square");

        assert_eq!(glyph.width(&font), 600.0);

        let elements = glyph.path(&font).elements();
        assert_eq!(
            elements,
            &[
                PathEl::MoveTo((50.0, 0.0).into()),
                PathEl::LineTo((150.0, 0.0).into()),
                PathEl::LineTo((150.0, 100.0).into()),
                PathEl::ClosePath,
                // closepath leaves the pen where it was
                PathEl::MoveTo((150.0, 100.0).into()),
            ]
        );

        let bounds = glyph.bounds(&font);
        assert_eq!(bounds.x0, 50.0);
        assert_eq!(bounds.y1, 100.0);
    }

    #[test]
    fn rendering_happens_once() {
        let font = TestFont::new(vec![square_glyph("square")]);
        let glyph = font.glyph("square");

        assert_eq!(glyph.render_passes(), 0);

        glyph.path(&font);
        glyph.width(&font);
        glyph.bounds(&font);
        glyph.path(&font);

        assert_eq!(glyph.render_passes(), 1);
    }

    #[test]
    fn division_feeds_the_next_operator() {
        let glyph = Type1CharString::new(
            "TestFont",
            "divided",
            vec![
                n(20.0),
                n(10.0),
                n(2.0),
                c(Command::Div),
                c(Command::Hsbw),
                c(Command::EndChar),
            ],
        );
        let font = TestFont::new(vec![glyph]);

        assert_eq!(font.glyph("divided").width(&font), 5.0);
    }
}
