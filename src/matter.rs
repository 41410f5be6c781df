//! Matter composition: elements, substances, mixtures, and the chemical
//! formula kept in step with a matter's personal elements.

use tracing::debug;

use crate::model::*;
use crate::storage::schema::{self, col};
use crate::storage::StorageBackend;
use crate::{Error, Graph, Result};

// ============================================================================
// Formula text
// ============================================================================

/// Split a formula into element symbols. A symbol starts at every
/// uppercase letter; digits and other characters stay with the symbol
/// they follow.
pub fn formula_tokens(formula: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = None;
    for (i, c) in formula.char_indices() {
        if c.is_ascii_uppercase() {
            if let Some(s) = start {
                tokens.push(&formula[s..i]);
            }
            start = Some(i);
        }
    }
    if let Some(s) = start {
        tokens.push(&formula[s..]);
    }
    tokens
}

/// Append `symbol` `count` times.
pub fn append_symbol(formula: &str, symbol: &str, count: usize) -> Result<String> {
    let len = symbol
        .len()
        .checked_mul(count)
        .and_then(|n| n.checked_add(formula.len()))
        .ok_or_else(|| Error::InvalidArgument(format!("formula cannot hold {count} more {symbol}")))?;
    let mut out = String::with_capacity(len);
    out.push_str(formula);
    for _ in 0..count {
        out.push_str(symbol);
    }
    Ok(out)
}

/// Drop the first `count` occurrences of `symbol`.
pub fn remove_symbol(formula: &str, symbol: &str, count: usize) -> String {
    let mut left = count;
    formula_tokens(formula)
        .into_iter()
        .filter(|token| {
            if left > 0 && *token == symbol {
                left -= 1;
                false
            } else {
                true
            }
        })
        .collect()
}

/// Render runs of the same symbol as counts: `"HHO"` → `"H2O"`.
pub fn compact_formula(formula: &str) -> String {
    let mut out = String::new();
    let mut run: Option<(&str, usize)> = None;
    for token in formula_tokens(formula) {
        run = match run {
            Some((symbol, n)) if symbol == token => Some((symbol, n + 1)),
            Some((symbol, n)) => {
                push_run(&mut out, symbol, n);
                Some((token, 1))
            }
            None => Some((token, 1)),
        };
    }
    if let Some((symbol, n)) = run {
        push_run(&mut out, symbol, n);
    }
    out
}

fn push_run(out: &mut String, symbol: &str, n: usize) {
    out.push_str(symbol);
    if n > 1 {
        out.push_str(&n.to_string());
    }
}

pub(crate) fn check_thickness(thickness: f64) -> Result<()> {
    if !thickness.is_finite() || thickness < 0.0 {
        return Err(Error::InvalidArgument(format!(
            "cover thickness must be finite and non-negative, got {thickness}"
        )));
    }
    Ok(())
}

impl<B: StorageBackend> Graph<B> {
    // ========================================================================
    // Formula
    // ========================================================================

    pub fn chemical_formula(&self, matter: NodeId) -> Result<String> {
        self.require_family(matter, Family::Matter)?;
        self.read(matter, schema::MATTER, col::FORMULA)
    }

    pub fn compact_formula(&self, matter: NodeId) -> Result<String> {
        Ok(compact_formula(&self.chemical_formula(matter)?))
    }

    fn write_formula(&self, matter: NodeId, formula: String) -> Result<()> {
        self.write(matter, Attribute::Formula, matter, schema::MATTER, col::FORMULA, formula)
    }

    /// Units a personal element edge with `quantity` stands for in the
    /// formula. `InvalidArgument` above `Settings::max_formula_count`.
    pub(crate) fn formula_count(&self, quantity: &Quantity) -> Result<usize> {
        let limit = self.settings.max_formula_count;
        if quantity.preferred().round() > limit as f64 {
            return Err(Error::InvalidArgument(format!(
                "element quantity {} exceeds the formula limit of {limit}",
                quantity.preferred()
            )));
        }
        Ok(quantity.count())
    }

    pub(crate) fn element_attached(&self, matter: NodeId, element: NodeId, count: usize) -> Result<()> {
        let formula = append_symbol(&self.chemical_formula(matter)?, &self.symbol(element)?, count)?;
        self.write_formula(matter, formula)
    }

    pub(crate) fn element_detached(&self, matter: NodeId, element: NodeId, count: usize) -> Result<()> {
        let formula = remove_symbol(&self.chemical_formula(matter)?, &self.symbol(element)?, count);
        self.write_formula(matter, formula)
    }

    pub(crate) fn element_requantified(
        &self,
        matter: NodeId,
        element: NodeId,
        before: usize,
        after: usize,
    ) -> Result<()> {
        use std::cmp::Ordering::*;
        match after.cmp(&before) {
            Greater => self.element_attached(matter, element, after - before),
            Less => self.element_detached(matter, element, before - after),
            Equal => Ok(()),
        }
    }

    // ========================================================================
    // Elements
    // ========================================================================

    pub fn add_element(&self, matter: NodeId, element: NodeId, quantity: Quantity) -> Result<EdgeId> {
        let value = self.valued(Relation::Elements, element)?.with_quantity(quantity);
        self.add_personal(matter, Relation::Elements, value)
    }

    /// Remove the personal element edge pointing at `element`.
    pub fn remove_element(&self, matter: NodeId, element: NodeId) -> Result<()> {
        let edge = self
            .personal(matter, Relation::Elements)?
            .into_iter()
            .find(|e| e.target == element)
            .ok_or_else(|| Error::NotFound(format!("{matter} has no personal element {element}")))?;
        self.remove_personal(matter, Relation::Elements, edge.id)
    }

    pub fn elements(&self, matter: NodeId) -> Result<Vec<Valued>> {
        self.effective(matter, Relation::Elements)
    }

    // ========================================================================
    // Matter-valued relations
    // ========================================================================

    pub fn add_substance(&self, mixture: NodeId, substance: NodeId, quantity: Quantity) -> Result<EdgeId> {
        let value = self.valued(Relation::Substances, substance)?.with_quantity(quantity);
        self.add_personal(mixture, Relation::Substances, value)
    }

    pub fn add_mixture(&self, mixture: NodeId, part: NodeId, quantity: Quantity) -> Result<EdgeId> {
        let value = self.valued(Relation::Mixtures, part)?.with_quantity(quantity);
        self.add_personal(mixture, Relation::Mixtures, value)
    }

    /// Record what a tangible object is made of.
    pub fn add_matter(&self, object: NodeId, matter: NodeId, quantity: Quantity) -> Result<EdgeId> {
        let value = self.valued(Relation::Matter, matter)?.with_quantity(quantity);
        self.add_personal(object, Relation::Matter, value)
    }

    pub fn substances(&self, mixture: NodeId) -> Result<Vec<Valued>> {
        self.effective(mixture, Relation::Substances)
    }

    pub fn mixtures(&self, mixture: NodeId) -> Result<Vec<Valued>> {
        self.effective(mixture, Relation::Mixtures)
    }

    pub fn matter(&self, object: NodeId) -> Result<Vec<Valued>> {
        self.effective(object, Relation::Matter)
    }

    // ========================================================================
    // Edge attributes
    // ========================================================================

    pub fn set_quantity(&self, edge: EdgeId, quantity: Quantity) -> Result<()> {
        let edge = self.edge(edge)?;
        self.rewrite_edge(&edge, quantity, edge.role)?;
        debug!(edge = %edge.id, ?quantity, "quantity set");
        Ok(())
    }

    pub fn set_state(&self, edge: EdgeId, state: StateOfMatter) -> Result<()> {
        let edge = self.edge(edge)?;
        if edge.role.state().is_none() {
            return Err(Error::InvalidArgument(format!(
                "{} edge {} has no state of matter",
                edge.relation, edge.id
            )));
        }
        self.rewrite_edge(&edge, edge.quantity, Role::Matter { state })
    }

    pub fn set_thickness(&self, edge: EdgeId, thickness: f64) -> Result<()> {
        let edge = self.edge(edge)?;
        if edge.role.thickness().is_none() {
            return Err(Error::InvalidArgument(format!(
                "{} edge {} has no thickness",
                edge.relation, edge.id
            )));
        }
        check_thickness(thickness)?;
        self.rewrite_edge(&edge, edge.quantity, Role::Cover { thickness })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_split_on_uppercase() {
        assert_eq!(formula_tokens("HHeO"), vec!["H", "He", "O"]);
        assert_eq!(formula_tokens(""), Vec::<&str>::new());
    }

    #[test]
    fn test_remove_first_occurrences() {
        assert_eq!(remove_symbol("HOHH", "H", 2), "OH");
        assert_eq!(remove_symbol("HeH", "H", 1), "He");
        assert_eq!(remove_symbol("CO", "N", 3), "CO");
    }

    #[test]
    fn test_compact_runs() {
        assert_eq!(compact_formula("HHO"), "H2O");
        assert_eq!(compact_formula("CHHHH"), "CH4");
        assert_eq!(compact_formula("HOH"), "HOH");
        assert_eq!(append_symbol("C", "O", 2).unwrap(), "COO");
        assert!(append_symbol("C", "O", usize::MAX).is_err());
    }

    #[test]
    fn test_requantify_keeps_formula_counts() {
        let g = Graph::open_memory().unwrap();
        let h = g.create_element("Hydrogen", "H", 1).unwrap();
        let gas = g.create_matter("Hydrogen gas", MatterKind::Substance, StateOfMatter::Gas).unwrap();
        let edge = g.add_element(gas, h, Quantity::exact(2.0)).unwrap();
        assert_eq!(g.chemical_formula(gas).unwrap(), "HH");

        g.set_quantity(edge, Quantity::exact(3.0)).unwrap();
        assert_eq!(g.compact_formula(gas).unwrap(), "H3");
        g.set_quantity(edge, Quantity::exact(1.0)).unwrap();
        assert_eq!(g.chemical_formula(gas).unwrap(), "H");
        assert!(matches!(g.set_state(edge, StateOfMatter::Gas), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_formula_count_is_bounded() {
        let g = Graph::open_memory().unwrap();
        let c = g.create_element("Carbon", "C", 6).unwrap();
        let coal = g.create_matter("Coal", MatterKind::Material, StateOfMatter::Solid).unwrap();

        assert!(matches!(
            g.add_element(coal, c, Quantity::exact(1e19)),
            Err(Error::InvalidArgument(_))
        ));
        assert!(g.elements(coal).unwrap().is_empty());

        let edge = g.add_element(coal, c, Quantity::exact(2.0)).unwrap();
        assert!(matches!(
            g.set_quantity(edge, Quantity::exact(1e19)),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(g.edge(edge).unwrap().quantity, Quantity::exact(2.0));
        assert_eq!(g.chemical_formula(coal).unwrap(), "CC");
    }

    #[test]
    fn test_mixture_roles() {
        let g = Graph::open_memory().unwrap();
        let salt = g.create_matter("Salt", MatterKind::Substance, StateOfMatter::Solid).unwrap();
        let brine = g.create_matter("Brine", MatterKind::Mixture, StateOfMatter::Liquid).unwrap();
        let edge = g.add_substance(brine, salt, Quantity::exact(0.1)).unwrap();
        assert_eq!(g.edge(edge).unwrap().role.state(), Some(StateOfMatter::Solid));

        g.set_state(edge, StateOfMatter::Liquid).unwrap();
        assert_eq!(g.substances(brine).unwrap()[0].role.state(), Some(StateOfMatter::Liquid));
        assert!(matches!(g.add_mixture(brine, salt, Quantity::exact(1.0)), Err(Error::InvalidArgument(_))));
        assert!(matches!(g.add_substance(salt, brine, Quantity::exact(1.0)), Err(Error::InvalidArgument(_))));
    }
}
