//! The Type 1 charstring interpreter.

use super::standard;
use super::{Command, RenderChain, Rendered, Token, Type1CharString, Type1CharStringReader};
use kurbo::{Affine, BezPath, Point};
use log::warn;
use smallvec::SmallVec;

/// Interpret a charstring's token sequence into an outline and width.
pub(crate) fn render(
    glyph: &Type1CharString,
    reader: &dyn Type1CharStringReader,
    chain: &mut RenderChain,
) -> Rendered {
    let mut renderer = Renderer {
        font_name: glyph.font_name(),
        glyph_name: glyph.name(),
        reader,
        chain,
        path: BezPath::new(),
        current: Point::ZERO,
        left_side_bearing: Point::ZERO,
        width: 0.0,
        is_flex: false,
        flex_points: SmallVec::new(),
        command_count: 0,
    };

    let mut numbers = Vec::new();
    for token in glyph.tokens() {
        match token {
            Token::Number(value) => numbers.push(*value),
            Token::Command(command) => renderer.handle_command(&mut numbers, *command),
        }
    }

    Rendered {
        path: renderer.path,
        width: renderer.width,
    }
}

struct Renderer<'a> {
    font_name: &'a str,
    glyph_name: &'a str,
    reader: &'a dyn Type1CharStringReader,
    chain: &'a mut RenderChain,
    path: BezPath,
    current: Point,
    left_side_bearing: Point,
    width: f32,
    is_flex: bool,
    flex_points: SmallVec<[Point; 8]>,
    command_count: u32,
}

impl<'a> Renderer<'a> {
    fn handle_command(&mut self, numbers: &mut Vec<f32>, command: Command) {
        self.command_count += 1;

        match command {
            Command::RMoveTo => {
                if let [dx, dy, ..] = numbers[..] {
                    if self.is_flex {
                        self.flex_points.push(Point::new(dx.into(), dy.into()));
                    } else {
                        self.rmove_to(dx.into(), dy.into());
                    }
                }
            }
            Command::VMoveTo => {
                if let [dy, ..] = numbers[..] {
                    if self.is_flex {
                        // Not a legal flex point, but some fonts emit it.
                        self.flex_points.push(Point::new(0.0, dy.into()));
                    } else {
                        self.rmove_to(0.0, dy.into());
                    }
                }
            }
            Command::HMoveTo => {
                if let [dx, ..] = numbers[..] {
                    if self.is_flex {
                        // Not a legal flex point, but some fonts emit it.
                        self.flex_points.push(Point::new(dx.into(), 0.0));
                    } else {
                        self.rmove_to(dx.into(), 0.0);
                    }
                }
            }
            Command::RLineTo => {
                if let [dx, dy, ..] = numbers[..] {
                    self.rline_to(dx.into(), dy.into());
                }
            }
            Command::HLineTo => {
                if let [dx, ..] = numbers[..] {
                    self.rline_to(dx.into(), 0.0);
                }
            }
            Command::VLineTo => {
                if let [dy, ..] = numbers[..] {
                    self.rline_to(0.0, dy.into());
                }
            }
            Command::RrCurveTo => {
                if let [dx1, dy1, dx2, dy2, dx3, dy3, ..] = numbers[..] {
                    self.rrcurve_to(
                        dx1.into(),
                        dy1.into(),
                        dx2.into(),
                        dy2.into(),
                        dx3.into(),
                        dy3.into(),
                    );
                }
            }
            Command::VhCurveTo => {
                if let [dy1, dx2, dy2, dx3, ..] = numbers[..] {
                    self.rrcurve_to(0.0, dy1.into(), dx2.into(), dy2.into(), dx3.into(), 0.0);
                }
            }
            Command::HvCurveTo => {
                if let [dx1, dx2, dy2, dy3, ..] = numbers[..] {
                    self.rrcurve_to(dx1.into(), 0.0, dx2.into(), dy2.into(), 0.0, dy3.into());
                }
            }
            Command::ClosePath => self.close_path(),
            Command::Hsbw => {
                if let [sbx, w, ..] = numbers[..] {
                    self.left_side_bearing = Point::new(sbx.into(), 0.0);
                    self.width = w;
                    self.current = self.left_side_bearing;
                }
            }
            Command::Sbw => {
                if let [sbx, sby, w, ..] = numbers[..] {
                    self.left_side_bearing = Point::new(sbx.into(), sby.into());
                    self.width = w;
                    self.current = self.left_side_bearing;
                }
            }
            Command::Seac => {
                if let [asb, adx, ady, bchar, achar, ..] = numbers[..] {
                    self.seac(asb, adx, ady, bchar, achar);
                }
            }
            Command::SetCurrentPoint => {
                if let [x, y, ..] = numbers[..] {
                    self.current = Point::new(x.into(), y.into());
                }
            }
            Command::CallOtherSubr => {
                if let [num, ..] = numbers[..] {
                    self.call_other_subr(num as i32);
                }
            }
            Command::Div => {
                if let [.., a, b] = numbers[..] {
                    numbers.truncate(numbers.len() - 2);
                    // The quotient stays on the stack for the next operator.
                    numbers.push(a / b);

                    return;
                }
            }
            Command::HStem
            | Command::VStem
            | Command::HStem3
            | Command::VStem3
            | Command::DotSection => {
                // hints are ignored
            }
            Command::EndChar => {}
            Command::CallSubr | Command::Return => {
                // subroutine calls should have been inlined before we got here
                warn!(
                    "unexpected charstring command {command:?} in glyph {} of font {}",
                    self.glyph_name, self.font_name
                );
            }
        }

        numbers.clear();
    }

    fn rmove_to(&mut self, dx: f64, dy: f64) {
        let target = Point::new(self.current.x + dx, self.current.y + dy);
        self.path.move_to(target);
        self.current = target;
    }

    fn rline_to(&mut self, dx: f64, dy: f64) {
        let target = Point::new(self.current.x + dx, self.current.y + dy);

        if self.path.elements().is_empty() {
            warn!(
                "rlineto without initial moveTo in font {}, glyph {}",
                self.font_name, self.glyph_name
            );
            self.path.move_to(target);
        } else {
            self.path.line_to(target);
        }

        self.current = target;
    }

    fn rrcurve_to(&mut self, dx1: f64, dy1: f64, dx2: f64, dy2: f64, dx3: f64, dy3: f64) {
        let p1 = Point::new(self.current.x + dx1, self.current.y + dy1);
        let p2 = Point::new(p1.x + dx2, p1.y + dy2);
        let p3 = Point::new(p2.x + dx3, p2.y + dy3);

        if self.path.elements().is_empty() {
            warn!(
                "rrcurveTo without initial moveTo in font {}, glyph {}",
                self.font_name, self.glyph_name
            );
            self.path.move_to(p3);
        } else {
            self.path.curve_to(p1, p2, p3);
        }

        self.current = p3;
    }

    fn close_path(&mut self) {
        if self.path.elements().is_empty() {
            warn!(
                "closepath without initial moveTo in font {}, glyph {}",
                self.font_name, self.glyph_name
            );
        } else {
            self.path.close_path();
        }

        // closepath does not move the pen, so restart the subpath where the
        // pen is.
        self.path.move_to(self.current);
    }

    /// Flex, driven through OtherSubrs 0 and 1.
    fn call_other_subr(&mut self, num: i32) {
        match num {
            0 => {
                // end flex
                self.is_flex = false;

                if self.flex_points.len() < 7 {
                    warn!(
                        "flex without moveTo in font {}, glyph {}, command {}",
                        self.font_name, self.glyph_name, self.command_count
                    );
                    self.flex_points.clear();

                    return;
                }

                // The first delta positions the reference point relative to
                // the pen; the second is relative to the reference point.
                // Fold both into one delta relative to the pen.
                let reference = Point::new(
                    self.current.x + self.flex_points[0].x,
                    self.current.y + self.flex_points[0].y,
                );
                let first = Point::new(
                    reference.x + self.flex_points[1].x - self.current.x,
                    reference.y + self.flex_points[1].y - self.current.y,
                );

                let (p2, p3) = (self.flex_points[2], self.flex_points[3]);
                self.rrcurve_to(first.x, first.y, p2.x, p2.y, p3.x, p3.y);

                let (p4, p5, p6) = (
                    self.flex_points[4],
                    self.flex_points[5],
                    self.flex_points[6],
                );
                self.rrcurve_to(p4.x, p4.y, p5.x, p5.y, p6.x, p6.y);

                self.flex_points.clear();
            }
            1 => {
                // begin flex
                self.is_flex = true;
            }
            _ => {
                warn!("invalid callothersubr parameter: {num}");
            }
        }
    }

    /// Standard encoding accented character: compose the glyph from a base
    /// and an accent resolved through the owning font.
    fn seac(&mut self, asb: f32, adx: f32, ady: f32, bchar: f32, achar: f32) {
        if let Some(base) = self.component(bchar as i32) {
            self.path.extend(base.elements().iter().copied());
        }

        if let Some(accent) = self.component(achar as i32) {
            let mut accent = accent.clone();
            accent.apply_affine(Affine::translate((
                self.left_side_bearing.x + f64::from(adx) - f64::from(asb),
                self.left_side_bearing.y + f64::from(ady),
            )));
            self.path.extend(accent.elements().iter().copied());
        }
    }

    /// The outline of a seac component, or `None` if the code does not
    /// resolve, the glyph is missing, or rendering it would re-enter a
    /// glyph further up the chain.
    fn component(&mut self, code: i32) -> Option<&'a BezPath> {
        let Some(name) = standard::glyph_name(code) else {
            warn!(
                "invalid seac character in glyph {} of font {}",
                self.glyph_name, self.font_name
            );

            return None;
        };

        if self.chain.iter().any(|entry| entry.as_str() == name) {
            warn!(
                "recursive seac component '{name}' in glyph {} of font {}",
                self.glyph_name, self.font_name
            );

            return None;
        }

        match self.reader.type1_charstring(name) {
            Ok(charstring) => Some(&charstring.rendered_nested(self.reader, self.chain).path),
            Err(_) => {
                warn!(
                    "invalid seac character in glyph {} of font {}",
                    self.glyph_name, self.font_name
                );

                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{TestFont, c, n};
    use super::super::{Command, Type1CharString};
    use kurbo::PathEl;

    fn count_curves(elements: &[PathEl]) -> usize {
        elements
            .iter()
            .filter(|e| matches!(e, PathEl::CurveTo(..)))
            .count()
    }

    fn flex_tokens(pairs: &[(f32, f32)]) -> Vec<super::super::Token> {
        let mut tokens = vec![
            n(0.0),
            n(500.0),
            c(Command::Hsbw),
            n(10.0),
            n(10.0),
            c(Command::RMoveTo),
            n(1.0),
            c(Command::CallOtherSubr),
        ];

        for (dx, dy) in pairs {
            tokens.push(n(*dx));
            tokens.push(n(*dy));
            tokens.push(c(Command::RMoveTo));
        }

        tokens.push(n(0.0));
        tokens.push(c(Command::CallOtherSubr));
        tokens.push(c(Command::EndChar));
        tokens
    }

    #[test]
    fn flex_emits_two_curves() {
        let pairs = [
            (10.0, 0.0), // reference point
            (5.0, 5.0),
            (10.0, 0.0),
            (10.0, -5.0),
            (10.0, -5.0),
            (10.0, 0.0),
            (5.0, 5.0),
        ];
        let glyph = Type1CharString::new("TestFont", "flexed", flex_tokens(&pairs));
        let font = TestFont::new(vec![glyph]);

        let elements = font.glyph("flexed").path(&font);
        assert_eq!(count_curves(elements.elements()), 2);

        // First control point folds the reference delta into the first
        // point delta: pen (10, 10) + (10, 0) + (5, 5).
        let PathEl::CurveTo(p1, _, _) = elements.elements()[1] else {
            panic!("expected a curve after the initial move");
        };
        assert_eq!(p1, (25.0, 15.0).into());
    }

    #[test]
    fn short_flex_is_abandoned() {
        let pairs = [(10.0, 0.0), (5.0, 5.0)];
        let glyph = Type1CharString::new("TestFont", "flexed", flex_tokens(&pairs));
        let font = TestFont::new(vec![glyph]);

        let elements = font.glyph("flexed").path(&font);
        assert_eq!(count_curves(elements.elements()), 0);
    }

    #[test]
    fn seac_composes_base_and_accent() {
        let base = Type1CharString::new(
            "TestFont",
            "a",
            vec![
                n(0.0),
                n(500.0),
                c(Command::Hsbw),
                n(10.0),
                n(0.0),
                c(Command::RMoveTo),
                n(100.0),
                n(0.0),
                c(Command::RLineTo),
                c(Command::EndChar),
            ],
        );
        let accent = Type1CharString::new(
            "TestFont",
            "grave",
            vec![
                n(0.0),
                n(500.0),
                c(Command::Hsbw),
                n(20.0),
                n(700.0),
                c(Command::RMoveTo),
                n(30.0),
                n(-40.0),
                c(Command::RLineTo),
                c(Command::EndChar),
            ],
        );
        let composite = Type1CharString::new(
            "TestFont",
            "agrave",
            vec![
                n(25.0),
                n(500.0),
                c(Command::Hsbw),
                // asb adx ady bchar achar
                n(5.0),
                n(30.0),
                n(200.0),
                n(97.0),
                n(193.0),
                c(Command::Seac),
                c(Command::EndChar),
            ],
        );
        let font = TestFont::new(vec![base, accent, composite]);

        let path = font.glyph("agrave").path(&font);
        let elements = path.elements();

        // base outline followed by the translated accent outline
        assert_eq!(elements.len(), 4);
        assert_eq!(elements[0], PathEl::MoveTo((10.0, 0.0).into()));
        assert_eq!(elements[1], PathEl::LineTo((110.0, 0.0).into()));
        // accent moveto (20, 700) shifted by (lsb 25 + adx 30 - asb 5, ady 200)
        assert_eq!(elements[2], PathEl::MoveTo((70.0, 900.0).into()));
        assert_eq!(elements[3], PathEl::LineTo((100.0, 860.0).into()));
    }

    #[test]
    fn seac_refuses_to_recurse_into_itself() {
        // A glyph named "a" that declares itself as both of its own
        // components.
        let glyph = Type1CharString::new(
            "TestFont",
            "a",
            vec![
                n(0.0),
                n(500.0),
                c(Command::Hsbw),
                n(0.0),
                n(0.0),
                n(0.0),
                n(97.0),
                n(97.0),
                c(Command::Seac),
                c(Command::EndChar),
            ],
        );
        let font = TestFont::new(vec![glyph]);

        let path = font.glyph("a").path(&font);
        assert!(path.elements().is_empty());
        assert_eq!(font.glyph("a").render_passes(), 1);
    }

    #[test]
    fn seac_with_a_missing_component_keeps_the_rest() {
        let base = Type1CharString::new(
            "TestFont",
            "a",
            vec![
                n(0.0),
                n(500.0),
                c(Command::Hsbw),
                n(10.0),
                n(0.0),
                c(Command::RMoveTo),
                c(Command::EndChar),
            ],
        );
        // achar 200 is "dieresis", which this font does not have.
        let composite = Type1CharString::new(
            "TestFont",
            "adieresis",
            vec![
                n(0.0),
                n(500.0),
                c(Command::Hsbw),
                n(0.0),
                n(0.0),
                n(0.0),
                n(97.0),
                n(200.0),
                c(Command::Seac),
                c(Command::EndChar),
            ],
        );
        let font = TestFont::new(vec![base, composite]);

        let path = font.glyph("adieresis").path(&font);
        assert_eq!(path.elements(), &[PathEl::MoveTo((10.0, 0.0).into())]);
    }

    #[test]
    fn drawing_without_a_move_recovers_with_an_implicit_one() {
        let glyph = Type1CharString::new(
            "TestFont",
            "bare",
            vec![
                n(0.0),
                n(500.0),
                c(Command::Hsbw),
                n(100.0),
                n(0.0),
                c(Command::RLineTo),
                n(0.0),
                n(50.0),
                c(Command::RLineTo),
                c(Command::EndChar),
            ],
        );
        let font = TestFont::new(vec![glyph]);

        let elements = font.glyph("bare").path(&font).elements().to_vec();
        assert_eq!(
            elements,
            vec![
                PathEl::MoveTo((100.0, 0.0).into()),
                PathEl::LineTo((100.0, 50.0).into()),
            ]
        );
    }

    #[test]
    fn sbw_sets_a_two_dimensional_bearing() {
        let glyph = Type1CharString::new(
            "TestFont",
            "shifted",
            vec![
                n(30.0),
                n(40.0),
                n(250.0),
                c(Command::Sbw),
                n(0.0),
                n(0.0),
                c(Command::RMoveTo),
                c(Command::EndChar),
            ],
        );
        let font = TestFont::new(vec![glyph]);

        let glyph = font.glyph("shifted");
        assert_eq!(glyph.width(&font), 250.0);
        assert_eq!(
            glyph.path(&font).elements(),
            &[PathEl::MoveTo((30.0, 40.0).into())]
        );
    }
}
