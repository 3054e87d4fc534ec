use owo_colors::{OwoColorize, Style as OwoStyle};

/// Applies colour and style to terminal text.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Painter {
    use_colour: bool,
}

impl Painter {
    pub(crate) fn new(use_colour: bool) -> Self {
        Self { use_colour }
    }

    pub(crate) fn heading<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold().cyan())
    }

    pub(crate) fn success<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold().green())
    }

    pub(crate) fn warning<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold().yellow())
    }

    /// Styles a decode or hardware failure shown inline with results.
    pub(crate) fn failure<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold().red())
    }

    pub(crate) fn muted<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().dimmed())
    }

    pub(crate) fn value<T: AsRef<str>>(&self, text: T) -> String {
        self.paint(text.as_ref(), OwoStyle::new().bold())
    }

    fn paint(&self, text: &str, style: OwoStyle) -> String {
        if self.use_colour {
            format!("{}", text.style(style))
        } else {
            text.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    type Styler = fn(&Painter, &str) -> String;

    #[rstest]
    #[case::heading(|painter: &Painter, text: &str| painter.heading(text))]
    #[case::success(|painter: &Painter, text: &str| painter.success(text))]
    #[case::warning(|painter: &Painter, text: &str| painter.warning(text))]
    #[case::failure(|painter: &Painter, text: &str| painter.failure(text))]
    #[case::muted(|painter: &Painter, text: &str| painter.muted(text))]
    #[case::value(|painter: &Painter, text: &str| painter.value(text))]
    fn plain_painter_leaves_text_alone(#[case] style: Styler) {
        assert_eq!("AA:BB", style(&Painter::new(false), "AA:BB"));
    }

    #[rstest]
    #[case::heading(|painter: &Painter, text: &str| painter.heading(text))]
    #[case::failure(|painter: &Painter, text: &str| painter.failure(text))]
    #[case::muted(|painter: &Painter, text: &str| painter.muted(text))]
    fn colour_painter_wraps_text_in_escapes(#[case] style: Styler) {
        let styled = style(&Painter::new(true), "AA:BB");

        assert_ne!("AA:BB", styled);
        assert!(styled.contains("AA:BB"));
        assert!(styled.starts_with('\u{1b}'));
    }
}
