//! Core-signature grammar for generalized ufuncs: one parenthesized list of
//! dimension names per operand, inputs and outputs separated by `->`, e.g.
//! `(i),(i)->()` or `(m,n),(n)->(m)`. A `?` suffix marks a dimension an
//! input operand may omit.

use crate::types::UFuncError;

/// Parsed core signature, flattened into per-operand index tables: operand
/// `k`'s dimension-name indices live in
/// `dim_ixs[offsets[k] .. offsets[k] + num_dims[k]]`.
pub struct CoreSignature {
    src: String,
    names: Vec<String>,
    num_dims: Vec<usize>,
    dim_ixs: Vec<usize>,
    omissible: Vec<bool>,
    offsets: Vec<usize>,
}

impl CoreSignature {
    pub fn parse(src: &str, nin: usize, nout: usize) -> Result<Self, UFuncError> {
        let invalid = |reason: &str| UFuncError::InvalidSignature {
            signature: src.to_string(),
            reason: reason.to_string(),
        };

        let compact: String = src.chars().filter(|c| !c.is_whitespace()).collect();
        let (ins, outs) = compact
            .split_once("->")
            .ok_or_else(|| invalid("missing `->`"))?;
        let in_lists = parse_operand_lists(ins).map_err(|r| invalid(&r))?;
        let out_lists = parse_operand_lists(outs).map_err(|r| invalid(&r))?;
        if in_lists.len() != nin {
            return Err(invalid(&format!(
                "{} input operand lists for a {}-input ufunc",
                in_lists.len(),
                nin
            )));
        }
        if out_lists.len() != nout {
            return Err(invalid(&format!(
                "{} output operand lists for a {}-output ufunc",
                out_lists.len(),
                nout
            )));
        }

        let mut names: Vec<String> = Vec::new();
        let mut num_dims = Vec::new();
        let mut dim_ixs = Vec::new();
        let mut omissible = Vec::new();
        let mut offsets = Vec::new();
        for (k, list) in in_lists.iter().chain(out_lists.iter()).enumerate() {
            let is_output = k >= nin;
            offsets.push(dim_ixs.len());
            num_dims.push(list.len());
            for (name, omit) in list {
                let ix = match names.iter().position(|n| n == name) {
                    Some(ix) => ix,
                    None if is_output => {
                        return Err(invalid(&format!(
                            "output dimension `{}` does not appear in any input",
                            name
                        )));
                    }
                    None => {
                        names.push(name.clone());
                        names.len() - 1
                    }
                };
                if *omit && is_output {
                    return Err(invalid("output operands may not omit dimensions"));
                }
                dim_ixs.push(ix);
                omissible.push(*omit);
            }
        }

        Ok(Self {
            src: src.to_string(),
            names,
            num_dims,
            dim_ixs,
            omissible,
            offsets,
        })
    }

    /// Signature string, for messages
    pub fn source(&self) -> &str {
        &self.src
    }

    /// Number of distinct dimension names
    pub fn num_distinct(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn num_operands(&self) -> usize {
        self.num_dims.len()
    }

    /// Declared core dimensions of one operand
    pub fn num_dims(&self, operand: usize) -> usize {
        self.num_dims[operand]
    }

    /// Name indices of one operand's core dimensions, in declaration order
    pub fn dim_indices(&self, operand: usize) -> &[usize] {
        let off = self.offsets[operand];
        &self.dim_ixs[off..off + self.num_dims[operand]]
    }

    /// `?` flags parallel to [`Self::dim_indices`]
    pub fn omissible(&self, operand: usize) -> &[bool] {
        let off = self.offsets[operand];
        &self.omissible[off..off + self.num_dims[operand]]
    }
}

/// Parse `(i),(j,k)` into per-operand `(name, omissible)` lists.
fn parse_operand_lists(s: &str) -> Result<Vec<Vec<(String, bool)>>, String> {
    let mut lists = Vec::new();
    let mut rest = s;
    loop {
        let Some(stripped) = rest.strip_prefix('(') else {
            return Err(format!("expected `(` at `{}`", rest));
        };
        let Some(close) = stripped.find(')') else {
            return Err("unclosed `(`".to_string());
        };
        let inner = &stripped[..close];
        let mut list = Vec::new();
        if !inner.is_empty() {
            for part in inner.split(',') {
                let (name, omit) = match part.strip_suffix('?') {
                    Some(base) => (base, true),
                    None => (part, false),
                };
                if name.is_empty()
                    || name.starts_with(|c: char| c.is_ascii_digit())
                    || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                {
                    return Err(format!("bad dimension name `{}`", part));
                }
                list.push((name.to_string(), omit));
            }
        }
        lists.push(list);
        rest = &stripped[close + 1..];
        if rest.is_empty() {
            return Ok(lists);
        }
        let Some(after_comma) = rest.strip_prefix(',') else {
            return Err(format!("expected `,` at `{}`", rest));
        };
        rest = after_comma;
    }
}

/* ------------------------------------------------------------------------- */
/*                                     Tests                                 */
/* ------------------------------------------------------------------------- */
