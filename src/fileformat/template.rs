use crate::runtime::Error;

///////////////////////////////
/// Every value a template may reference
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Qname,
    R1,
    R2,
    R2Qual,
    R2Qname,
    Bc1Raw,
    Bc2Raw,
    Bc1,
    Bc2,
    Cell,
    Umi,
    Raw,
    Assigned,
}

impl Field {
    pub fn from_name(name: &str) -> Option<Field> {
        let field = match name {
            "qname" => Field::Qname,
            "r1" => Field::R1,
            "r2" => Field::R2,
            "r2_qual" => Field::R2Qual,
            "r2_qname" => Field::R2Qname,
            "bc1" => Field::Bc1Raw,
            "bc2" => Field::Bc2Raw,
            "BC1" => Field::Bc1,
            "BC2" => Field::Bc2,
            "cell" => Field::Cell,
            "UMI" => Field::Umi,
            "raw" => Field::Raw,
            "assigned" => Field::Assigned,
            _ => return None,
        };
        Some(field)
    }

    ///////////////////////////////
    /// Fields only produced by barcode resolution
    pub fn needs_barcodes(&self) -> bool {
        matches!(
            self,
            Field::Bc1Raw | Field::Bc2Raw | Field::Bc1 | Field::Bc2
        )
    }

    ///////////////////////////////
    /// Fields derived from other templates; only BAM tags may use them
    pub fn is_derived(&self) -> bool {
        matches!(self, Field::Cell | Field::Umi | Field::Raw | Field::Assigned)
    }
}

///////////////////////////////
/// Something a template can be rendered against
pub trait FieldSource {
    fn field(&self, field: Field) -> &[u8];
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Selector {
    Index(i64),
    Slice {
        start: Option<i64>,
        stop: Option<i64>,
        step: i64,
    },
}

impl Selector {
    fn apply(&self, value: &[u8]) -> Vec<u8> {
        let len = value.len() as i64;
        match *self {
            Selector::Index(i) => {
                let i = if i < 0 { i + len } else { i };
                if (0..len).contains(&i) {
                    vec![value[i as usize]]
                } else {
                    Vec::new()
                }
            }
            Selector::Slice { start, stop, step } => {
                let (start, stop) = adjust_slice(len, start, stop, step);
                let mut out = Vec::new();
                let mut i = start;
                while (step > 0 && i < stop) || (step < 0 && i > stop) {
                    out.push(value[i as usize]);
                    // a step past the end of i64 leaves the slice anyway
                    match i.checked_add(step) {
                        Some(next) => i = next,
                        None => break,
                    }
                }
                out
            }
        }
    }
}

// Clamp slice bounds the way sequence slicing in most scripting languages does
fn adjust_slice(len: i64, start: Option<i64>, stop: Option<i64>, step: i64) -> (i64, i64) {
    let clamp = |bound: i64| -> i64 {
        if bound < 0 {
            let bound = bound + len;
            if bound < 0 {
                if step < 0 { -1 } else { 0 }
            } else {
                bound
            }
        } else if bound >= len {
            if step < 0 { len - 1 } else { len }
        } else {
            bound
        }
    };
    let start = match start {
        Some(s) => clamp(s),
        None => if step < 0 { len - 1 } else { 0 },
    };
    let stop = match stop {
        Some(s) => clamp(s),
        None => if step < 0 { -1 } else { len },
    };
    (start, stop)
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Piece {
    Literal(Vec<u8>),
    Expr { field: Field, selectors: Vec<Selector> },
}

///////////////////////////////
/// Literal text with `{field[a:b:c]...}` placeholders; `{{` and `}}` escape braces
#[derive(Clone, Debug)]
pub struct Template {
    source: String,
    pieces: Vec<Piece>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Template, Error> {
        let mut pieces = Vec::new();
        let mut literal = Vec::new();
        let mut chars = source.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    literal.push(b'{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    literal.push(b'}');
                }
                '{' => {
                    let end = source[pos..]
                        .find('}')
                        .map(|e| pos + e)
                        .ok_or_else(|| Error::template(source, "unclosed '{'"))?;
                    if !literal.is_empty() {
                        pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                    }
                    pieces.push(parse_expr(source, &source[pos + 1..end])?);
                    while let Some(&(p, _)) = chars.peek() {
                        if p > end {
                            break;
                        }
                        chars.next();
                    }
                }
                '}' => return Err(Error::template(source, "single '}' is not allowed")),
                _ => {
                    let mut buf = [0u8; 4];
                    literal.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                }
            }
        }
        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        Ok(Template {
            source: source.to_string(),
            pieces,
        })
    }

    ///////////////////////////////
    /// Parse a template that may only reference fields of the input read pair
    pub fn parse_base(source: &str) -> Result<Template, Error> {
        let template = Template::parse(source)?;
        if let Some(field) = template.fields().find(|f| f.is_derived()) {
            return Err(Error::template(
                source,
                format!("field {:?} is not available here", field),
            ));
        }
        Ok(template)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.pieces.iter().filter_map(|p| match p {
            Piece::Expr { field, .. } => Some(*field),
            Piece::Literal(_) => None,
        })
    }

    pub fn needs_barcodes(&self) -> bool {
        self.fields().any(|f| f.needs_barcodes())
    }

    pub fn render<S: FieldSource + ?Sized>(&self, source: &S) -> Vec<u8> {
        let mut out = Vec::new();
        self.render_into(source, &mut out);
        out
    }

    pub fn render_into<S: FieldSource + ?Sized>(&self, source: &S, out: &mut Vec<u8>) {
        for piece in &self.pieces {
            match piece {
                Piece::Literal(text) => out.extend_from_slice(text),
                Piece::Expr { field, selectors } => {
                    let value = source.field(*field);
                    match selectors.split_first() {
                        None => out.extend_from_slice(value),
                        Some((first, rest)) => {
                            let mut value = first.apply(value);
                            for sel in rest {
                                value = sel.apply(&value);
                            }
                            out.extend_from_slice(&value);
                        }
                    }
                }
            }
        }
    }
}

fn parse_expr(template: &str, expr: &str) -> Result<Piece, Error> {
    let expr = expr.trim();
    let name_end = expr.find('[').unwrap_or(expr.len());
    let name = expr[..name_end].trim();
    let field = Field::from_name(name)
        .ok_or_else(|| Error::template(template, format!("unknown field '{}'", name)))?;

    let mut selectors = Vec::new();
    let mut rest = &expr[name_end..];
    while !rest.is_empty() {
        if !rest.starts_with('[') {
            return Err(Error::template(template, format!("unexpected '{}'", rest)));
        }
        let close = rest
            .find(']')
            .ok_or_else(|| Error::template(template, "unclosed '['"))?;
        selectors.push(parse_selector(template, &rest[1..close])?);
        rest = rest[close + 1..].trim_start();
    }
    Ok(Piece::Expr { field, selectors })
}

fn parse_selector(template: &str, inner: &str) -> Result<Selector, Error> {
    let parse_bound = |s: &str| -> Result<Option<i64>, Error> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(None);
        }
        s.parse::<i64>()
            .map(Some)
            .map_err(|_| Error::template(template, format!("'{}' is not an integer", s)))
    };

    let parts: Vec<&str> = inner.split(':').collect();
    match parts.as_slice() {
        [index] => match parse_bound(index)? {
            Some(i) => Ok(Selector::Index(i)),
            None => Err(Error::template(template, "empty index")),
        },
        [start, stop] => Ok(Selector::Slice {
            start: parse_bound(start)?,
            stop: parse_bound(stop)?,
            step: 1,
        }),
        [start, stop, step] => {
            let step = parse_bound(step)?.unwrap_or(1);
            if step == 0 {
                return Err(Error::template(template, "slice step cannot be zero"));
            }
            Ok(Selector::Slice {
                start: parse_bound(start)?,
                stop: parse_bound(stop)?,
                step,
            })
        }
        _ => Err(Error::template(template, format!("bad selector '[{}]'", inner))),
    }
}
