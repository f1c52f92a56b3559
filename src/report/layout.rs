//! Page layout for the text-only report.
//!
//! Positions are top-down millimetres on A4. Widths come from the Helvetica
//! metrics because the built-in faces carry no measurable font program; text
//! is reduced to Latin-1 first, with `?` for anything the faces cannot show.
pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;
pub const MARGIN_MM: f32 = 10.0;
/// Content below this distance from the bottom edge moves to a new page.
pub const BREAK_MARGIN_MM: f32 = 20.0;

const PT_PER_MM: f32 = 72.0 / 25.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

impl Font {
    fn glyph_width(self, ch: char) -> u16 {
        let table = match self {
            Self::Regular => &HELVETICA_WIDTHS,
            Self::Bold => &HELVETICA_BOLD_WIDTHS,
        };
        match ch {
            ' '..='~' => table[ch as usize - 32],
            _ => 556,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
}

/// One line of text fixed on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub font: Font,
    pub size_pt: f32,
    pub x_mm: f32,
    /// Baseline distance from the top edge.
    pub baseline_mm: f32,
    pub text: String,
}

/// Cursor-driven layout that breaks pages as lines are added.
pub struct Layout {
    pages: Vec<Vec<PlacedLine>>,
    current: Vec<PlacedLine>,
    cursor_mm: f32,
}

impl Default for Layout {
    fn default() -> Self {
        Self::new()
    }
}

impl Layout {
    pub fn new() -> Self {
        Self {
            pages: Vec::new(),
            current: Vec::new(),
            cursor_mm: MARGIN_MM,
        }
    }

    /// Single line of text occupying `height_mm`; breaks the page first if
    /// the line would not fit.
    pub fn cell(&mut self, font: Font, size_pt: f32, height_mm: f32, align: Align, text: &str) {
        if self.cursor_mm + height_mm > PAGE_HEIGHT_MM - BREAK_MARGIN_MM {
            self.new_page();
        }
        let text = to_latin1(text);
        let x_mm = match align {
            Align::Left => MARGIN_MM,
            Align::Center => {
                let width = text_width_mm(font, size_pt, &text);
                MARGIN_MM + ((content_width_mm() - width) / 2.0).max(0.0)
            }
        };
        let baseline_mm = self.cursor_mm + height_mm / 2.0 + 0.3 * size_pt / PT_PER_MM;
        self.current.push(PlacedLine {
            font,
            size_pt,
            x_mm,
            baseline_mm,
            text,
        });
        self.cursor_mm += height_mm;
    }

    /// Word-wrapped block; explicit newlines start new lines.
    pub fn paragraph(&mut self, font: Font, size_pt: f32, line_height_mm: f32, text: &str) {
        for line in wrap_text(font, size_pt, content_width_mm(), text) {
            self.cell(font, size_pt, line_height_mm, Align::Left, &line);
        }
    }

    /// Vertical gap; never starts a page on its own.
    pub fn gap(&mut self, height_mm: f32) {
        self.cursor_mm += height_mm;
    }

    fn new_page(&mut self) {
        let finished = std::mem::take(&mut self.current);
        self.pages.push(finished);
        self.cursor_mm = MARGIN_MM;
    }

    /// Finished pages; always at least one.
    pub fn into_pages(mut self) -> Vec<Vec<PlacedLine>> {
        let last = std::mem::take(&mut self.current);
        self.pages.push(last);
        self.pages
    }
}

fn content_width_mm() -> f32 {
    PAGE_WIDTH_MM - 2.0 * MARGIN_MM
}

/// Keep what the WinAnsi-encoded built-in faces can show.
pub fn to_latin1(text: &str) -> String {
    text.chars()
        .map(|ch| match ch {
            '\t' => ' ',
            ' '..='~' | '\u{a0}'..='\u{ff}' => ch,
            _ => '?',
        })
        .collect()
}

fn text_width_mm(font: Font, size_pt: f32, text: &str) -> f32 {
    let units: u32 = text.chars().map(|ch| u32::from(font.glyph_width(ch))).sum();
    units as f32 * size_pt / 1000.0 / PT_PER_MM
}

/// Greedy word wrap; words wider than a line are split by character.
pub fn wrap_text(font: Font, size_pt: f32, width_mm: f32, text: &str) -> Vec<String> {
    let fits = |candidate: &str| text_width_mm(font, size_pt, &to_latin1(candidate)) <= width_mm;
    let mut lines = Vec::new();
    for source_line in text.split('\n') {
        let source_line = source_line.trim_end_matches('\r');
        let mut line = String::new();
        for word in source_line.split(' ').filter(|word| !word.is_empty()) {
            let candidate = if line.is_empty() {
                word.to_string()
            } else {
                format!("{line} {word}")
            };
            if fits(&candidate) {
                line = candidate;
                continue;
            }
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            if fits(word) {
                line = word.to_string();
                continue;
            }
            for ch in word.chars() {
                let mut next = line.clone();
                next.push(ch);
                if !line.is_empty() && !fits(&next) {
                    lines.push(std::mem::take(&mut line));
                    line.push(ch);
                } else {
                    line = next;
                }
            }
        }
        lines.push(line);
    }
    lines
}

// Advance widths (1/1000 em) for ASCII 32..=126.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // '0'..'?'
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // 'P'..'_'
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // '`'..'o'
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // 'p'..'~'
];
