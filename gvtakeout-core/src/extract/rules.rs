//! Declarative `(tag, class) -> handler` dispatch.
//!
//! A rule table is walked once over a subtree. Every element that matches a
//! rule is handed to that rule's handler together with its ancestors (limited
//! to the walked subtree), and the handler appends fragments. The walk always
//! continues into the children of a matched element.

use crate::markup::Element;

/// Appends fragments discovered at `el`.
pub(crate) type Handler<F> = fn(el: &Element, ancestors: &[&Element], out: &mut Vec<F>);

pub(crate) struct Rule<F> {
    /// `None` matches any tag
    pub tag: Option<&'static str>,
    /// `None` matches regardless of class
    pub class: Option<&'static str>,
    pub handler: Handler<F>,
}

impl<F> Rule<F> {
    fn matches(&self, el: &Element) -> bool {
        self.tag.map_or(true, |tag| el.tag == tag)
            && self.class.map_or(true, |class| el.has_class(class))
    }
}

/// Walk `root` and collect fragments from every matching rule, in document order.
pub(crate) fn collect<F>(root: &Element, rules: &[Rule<F>]) -> Vec<F> {
    let mut fragments = Vec::new();
    root.walk(&mut |el, ancestors| {
        for rule in rules {
            if rule.matches(el) {
                (rule.handler)(el, ancestors, &mut fragments);
            }
        }
    });
    fragments
}
