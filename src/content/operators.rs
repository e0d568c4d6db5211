//! Content stream operators.
//!
//! Only the operators that affect which glyphs a page shows get their own
//! variant: text objects, font selection, text showing and graphics state
//! save/restore (which scopes the current font). Everything else is kept
//! as [`Operator::Other`] with its raw operands.

use std::collections::HashMap;

use crate::object::Object;

/// A content stream operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    /// Begin text object (BT)
    BeginText,
    /// End text object (ET)
    EndText,
    /// Set font and size (Tf)
    Tf {
        /// Resource name of the font
        font: String,
        /// Font size
        size: f64,
    },
    /// Show text string (Tj)
    Tj {
        /// Character codes
        text: Vec<u8>,
    },
    /// Show text with individual glyph positioning (TJ)
    TJ {
        /// Strings and positioning adjustments
        array: Vec<TextElement>,
    },
    /// Move to next line and show text (')
    Quote {
        /// Character codes
        text: Vec<u8>,
    },
    /// Set spacing, move to next line and show text (")
    DoubleQuote {
        /// Word spacing
        word_space: f64,
        /// Character spacing
        char_space: f64,
        /// Character codes
        text: Vec<u8>,
    },
    /// Save graphics state (q)
    SaveState,
    /// Restore graphics state (Q)
    RestoreState,
    /// Paint an XObject (Do)
    Do {
        /// Resource name of the XObject
        name: String,
    },
    /// Inline image (BI ... ID ... EI)
    InlineImage {
        /// Image dictionary with abbreviated keys
        dict: HashMap<String, Object>,
        /// Raw image bytes
        data: Vec<u8>,
    },
    /// Any other operator
    Other {
        /// Operator name
        name: String,
        /// Operands
        operands: Vec<Object>,
    },
}

/// Element of a TJ array.
#[derive(Debug, Clone, PartialEq)]
pub enum TextElement {
    /// Character codes to show
    String(Vec<u8>),
    /// Adjustment in thousandths of text space
    Offset(f64),
}

impl Operator {
    /// Build an operator from its name and operand stack.
    ///
    /// Operators with missing or mistyped operands degrade to
    /// [`Operator::Other`] rather than failing the whole stream.
    pub fn from_parts(name: &[u8], operands: Vec<Object>) -> Operator {
        let op = match name {
            b"BT" => Some(Operator::BeginText),
            b"ET" => Some(Operator::EndText),
            b"q" => Some(Operator::SaveState),
            b"Q" => Some(Operator::RestoreState),
            b"Tf" => match operands.as_slice() {
                [Object::Name(font), size] => size.as_number().map(|size| Operator::Tf {
                    font: font.clone(),
                    size,
                }),
                _ => None,
            },
            b"Tj" => last_string(&operands).map(|text| Operator::Tj { text }),
            b"'" => last_string(&operands).map(|text| Operator::Quote { text }),
            b"\"" => match operands.as_slice() {
                [aw, ac, Object::String(text)] => Some(Operator::DoubleQuote {
                    word_space: aw.as_number().unwrap_or(0.0),
                    char_space: ac.as_number().unwrap_or(0.0),
                    text: text.clone(),
                }),
                _ => None,
            },
            b"TJ" => match operands.last() {
                Some(Object::Array(arr)) => Some(Operator::TJ {
                    array: arr
                        .to_vec()
                        .into_iter()
                        .filter_map(|el| match el {
                            Object::String(s) => Some(TextElement::String(s)),
                            other => other.as_number().map(TextElement::Offset),
                        })
                        .collect(),
                }),
                _ => None,
            },
            b"Do" => match operands.last() {
                Some(Object::Name(n)) => Some(Operator::Do { name: n.clone() }),
                _ => None,
            },
            _ => None,
        };
        op.unwrap_or_else(|| Operator::Other {
            name: String::from_utf8_lossy(name).into_owned(),
            operands,
        })
    }

    /// Character codes shown by a text-showing operator.
    ///
    /// TJ strings are concatenated; non-showing operators yield `None`.
    pub fn shown_text(&self) -> Option<Vec<u8>> {
        match self {
            Operator::Tj { text } | Operator::Quote { text } | Operator::DoubleQuote { text, .. } => {
                Some(text.clone())
            },
            Operator::TJ { array } => Some(
                array
                    .iter()
                    .filter_map(|el| match el {
                        TextElement::String(s) => Some(s.as_slice()),
                        TextElement::Offset(_) => None,
                    })
                    .flatten()
                    .copied()
                    .collect(),
            ),
            _ => None,
        }
    }
}

fn last_string(operands: &[Object]) -> Option<Vec<u8>> {
    operands.last().and_then(|o| o.as_string()).map(<[u8]>::to_vec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Array;
    use std::rc::Rc;

    #[test]
    fn test_tf() {
        let op = Operator::from_parts(b"Tf", vec![Object::name("F1"), Object::Integer(12)]);
        assert_eq!(
            op,
            Operator::Tf {
                font: "F1".to_string(),
                size: 12.0
            }
        );
    }

    #[test]
    fn test_bad_operands_fall_back() {
        let op = Operator::from_parts(b"Tf", vec![Object::Integer(12)]);
        assert!(matches!(op, Operator::Other { ref name, .. } if name == "Tf"));
        let op = Operator::from_parts(b"re", vec![Object::Integer(0); 4]);
        assert!(matches!(op, Operator::Other { ref operands, .. } if operands.len() == 4));
    }

    #[test]
    fn test_shown_text() {
        let arr = Rc::new(Array::from_objects(vec![
            Object::string("AB"),
            Object::Integer(-120),
            Object::string("C"),
        ]));
        let tj = Operator::from_parts(b"TJ", vec![Object::Array(arr)]);
        assert_eq!(tj.shown_text(), Some(b"ABC".to_vec()));

        let dq = Operator::from_parts(b"\"", vec![Object::Integer(1), Object::Real(0.5), Object::string("x")]);
        assert_eq!(dq.shown_text(), Some(b"x".to_vec()));
        assert_eq!(Operator::BeginText.shown_text(), None);
    }
}
