// Copyright 2026 the Render Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The structured operation stream a template parser produces.
//!
//! Nothing here is textual: a host (or a parser living elsewhere) builds these trees directly and
//! hands them to [`crate::compile`]. Names are plain strings; the compiler resolves them to scope
//! symbols.

use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;

use crate::value::Value;

/// An expression that evaluates to a reference.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// A literal value.
    Literal(Value),
    /// `this`.
    This,
    /// A block parameter (`|item|`).
    Local(Rc<str>),
    /// A named component argument (`@title`). Only valid inside a layout.
    Arg(Rc<str>),
    /// A free name: a block parameter if one is in scope, otherwise the dynamic scope, otherwise
    /// a property of `this`.
    Name(Rc<str>),
    /// Property access on another expression.
    Path(Box<Expr>, Vec<Rc<str>>),
    /// A helper call.
    Helper {
        /// The helper's name.
        name: Rc<str>,
        /// Its arguments.
        args: Args,
    },
    /// String concatenation, skipping `null` and `undefined` parts.
    Concat(Vec<Expr>),
    /// Whether the invoking template passed the named block (`default` or `inverse`).
    HasBlock(Rc<str>),
    /// Whether the named block takes parameters.
    HasBlockParams(Rc<str>),
}

impl Expr {
    /// A literal.
    pub fn lit(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// A dotted path: `this.a.b`, `@arg.a`, or `name.a`.
    #[must_use]
    pub fn path(path: &str) -> Self {
        let mut segments = path.split('.');
        let head = match segments.next().unwrap_or_default() {
            "this" => Self::This,
            arg if arg.starts_with('@') => Self::Arg(Rc::from(&arg[1..])),
            name => Self::Name(Rc::from(name)),
        };
        let tail: Vec<Rc<str>> = segments.map(Rc::from).collect();
        if tail.is_empty() {
            head
        } else {
            Self::Path(Box::new(head), tail)
        }
    }

    /// A block parameter.
    #[must_use]
    pub fn local(name: &str) -> Self {
        Self::Local(Rc::from(name))
    }

    /// Property access on a block parameter: `item.label`.
    #[must_use]
    pub fn local_path(name: &str, path: &str) -> Self {
        Self::Path(
            Box::new(Self::local(name)),
            path.split('.').map(Rc::from).collect(),
        )
    }

    /// A helper call with positional arguments.
    #[must_use]
    pub fn helper(name: &str, positional: Vec<Self>) -> Self {
        Self::Helper {
            name: Rc::from(name),
            args: Args {
                positional,
                named: Vec::new(),
            },
        }
    }

    /// Returns `true` for plain reads, which render through a guarded append (the value may be a
    /// component definition).
    #[must_use]
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            Self::This | Self::Local(_) | Self::Arg(_) | Self::Name(_) | Self::Path(..)
        )
    }
}

/// Positional and named arguments.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Args {
    /// Positional arguments, in order.
    pub positional: Vec<Expr>,
    /// Named arguments, in source order.
    pub named: Vec<(Rc<str>, Expr)>,
}

impl Args {
    /// Adds a named argument.
    #[must_use]
    pub fn with(mut self, name: &str, value: Expr) -> Self {
        self.named.push((Rc::from(name), value));
        self
    }

    /// Adds a positional argument.
    #[must_use]
    pub fn arg(mut self, value: Expr) -> Self {
        self.positional.push(value);
        self
    }
}

/// A nested block of statements with optional block parameters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Block {
    /// Block parameter names (`as |a b|`).
    pub params: Vec<Rc<str>>,
    /// The block body.
    pub statements: Vec<Statement>,
}

impl Block {
    /// A block without parameters.
    #[must_use]
    pub fn new(statements: Vec<Statement>) -> Self {
        Self {
            params: Vec::new(),
            statements,
        }
    }

    /// A block with parameters.
    #[must_use]
    pub fn with_params(params: &[&str], statements: Vec<Statement>) -> Self {
        Self {
            params: params.iter().map(|p| Rc::from(*p)).collect(),
            statements,
        }
    }
}

/// An element attribute.
#[derive(Clone, Debug, PartialEq)]
pub enum Attr {
    /// A literal attribute.
    Static {
        /// Attribute name.
        name: Rc<str>,
        /// Attribute value.
        value: Rc<str>,
    },
    /// A bound attribute. `false`, `null` and `undefined` omit it.
    Dynamic {
        /// Attribute name.
        name: Rc<str>,
        /// Bound value.
        value: Expr,
        /// Skip escaping.
        trusting: bool,
    },
}

/// An element modifier invocation (`{{on "click" this.save}}`).
#[derive(Clone, Debug, PartialEq)]
pub struct ModifierCall {
    /// Modifier name, passed to the tree adapter.
    pub name: Rc<str>,
    /// Its arguments.
    pub args: Args,
}

/// An element with attributes, modifiers and children.
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    /// Tag name.
    pub tag: Rc<str>,
    /// Attributes, in source order.
    pub attrs: Vec<Attr>,
    /// Modifiers, in source order.
    pub modifiers: Vec<ModifierCall>,
    /// Child statements.
    pub children: Vec<Statement>,
}

impl Element {
    /// An empty element.
    #[must_use]
    pub fn new(tag: &str) -> Self {
        Self {
            tag: Rc::from(tag),
            attrs: Vec::new(),
            modifiers: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Adds a literal attribute.
    #[must_use]
    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push(Attr::Static {
            name: Rc::from(name),
            value: Rc::from(value),
        });
        self
    }

    /// Adds a bound attribute.
    #[must_use]
    pub fn bind(mut self, name: &str, value: Expr) -> Self {
        self.attrs.push(Attr::Dynamic {
            name: Rc::from(name),
            value,
            trusting: false,
        });
        self
    }

    /// Adds a modifier.
    #[must_use]
    pub fn modifier(mut self, name: &str, args: Args) -> Self {
        self.modifiers.push(ModifierCall {
            name: Rc::from(name),
            args,
        });
        self
    }

    /// Appends a child statement.
    #[must_use]
    pub fn child(mut self, statement: Statement) -> Self {
        self.children.push(statement);
        self
    }

    /// Wraps the element in a statement.
    #[must_use]
    pub fn build(self) -> Statement {
        Statement::Element(self)
    }
}

/// A component invocation with statically known name.
#[derive(Clone, Debug, PartialEq)]
pub struct Invocation {
    /// Component name, resolved at compile time.
    pub name: Rc<str>,
    /// Arguments.
    pub args: Args,
    /// The default block, available to the layout's `{{yield}}`.
    pub default: Option<Block>,
    /// The inverse (`{{else}}`) block.
    pub inverse: Option<Block>,
}

/// A template statement.
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    /// Literal text.
    Text(Rc<str>),
    /// An HTML comment.
    Comment(Rc<str>),
    /// `{{expr}}` or `{{{expr}}}`.
    Append {
        /// The value.
        value: Expr,
        /// Insert unescaped.
        trusting: bool,
    },
    /// An element.
    Element(Element),
    /// `{{#if}}`.
    If {
        /// The condition.
        cond: Expr,
        /// Rendered when truthy.
        then: Block,
        /// Rendered when falsy.
        otherwise: Option<Block>,
    },
    /// `{{#unless}}`.
    Unless {
        /// The condition.
        cond: Expr,
        /// Rendered when falsy.
        then: Block,
        /// Rendered when truthy.
        otherwise: Option<Block>,
    },
    /// `{{#each}}`; the body receives the item and its index (or entry key).
    Each {
        /// The list or record.
        iterable: Expr,
        /// Key policy; `@identity` when `None`.
        key: Option<Rc<str>>,
        /// Rendered per item.
        body: Block,
        /// Rendered when there are no items.
        otherwise: Option<Block>,
    },
    /// `{{#with}}`; the body receives the value when it is truthy.
    With {
        /// The value.
        value: Expr,
        /// Rendered when truthy.
        body: Block,
        /// Rendered when falsy.
        otherwise: Option<Block>,
    },
    /// `{{#-with-dynamic-vars}}`.
    WithDynamicVars {
        /// Bindings added to the dynamic scope for the body.
        vars: Vec<(Rc<str>, Expr)>,
        /// The body.
        body: Block,
    },
    /// `<Component />` with a name known at compile time.
    Component(Invocation),
    /// `{{component expr}}`; `expr` may be a definition or a registered name.
    DynamicComponent {
        /// The definition (or name).
        definition: Expr,
        /// Arguments.
        args: Args,
        /// Default block.
        default: Option<Block>,
        /// Inverse block.
        inverse: Option<Block>,
    },
    /// `{{yield}}` inside a layout.
    Yield {
        /// `default` or `inverse`.
        to: Rc<str>,
        /// Values for the block's parameters.
        params: Vec<Expr>,
    },
    /// `{{debugger}}`.
    Debugger,
}

impl Statement {
    /// Literal text.
    #[must_use]
    pub fn text(text: &str) -> Self {
        Self::Text(Rc::from(text))
    }

    /// Escaped `{{value}}`.
    #[must_use]
    pub fn append(value: Expr) -> Self {
        Self::Append {
            value,
            trusting: false,
        }
    }

    /// `{{#if cond}}then{{/if}}`.
    #[must_use]
    pub fn if_(cond: Expr, then: Vec<Self>) -> Self {
        Self::If {
            cond,
            then: Block::new(then),
            otherwise: None,
        }
    }

    /// `{{#each iterable key=... as |item index|}}`.
    #[must_use]
    pub fn each(iterable: Expr, key: Option<&str>, body: Block) -> Self {
        Self::Each {
            iterable,
            key: key.map(Rc::from),
            body,
            otherwise: None,
        }
    }

    /// `{{yield params...}}` to the default block.
    #[must_use]
    pub fn yield_(params: Vec<Expr>) -> Self {
        Self::Yield {
            to: Rc::from("default"),
            params,
        }
    }

    /// `<Name @a=... />` with no blocks.
    #[must_use]
    pub fn component(name: &str, args: Args) -> Self {
        Self::Component(Invocation {
            name: Rc::from(name),
            args,
            default: None,
            inverse: None,
        })
    }
}

/// A top-level template.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Template {
    /// The body.
    pub statements: Vec<Statement>,
}

impl Template {
    /// A template over `statements`.
    #[must_use]
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }
}

/// How a layout is framed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LayoutKind {
    /// The body renders inside a wrapping element named by the instance's tag name.
    Wrapped,
    /// The body renders as-is.
    #[default]
    Tagless,
}

/// A component layout.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Layout {
    /// Framing.
    pub kind: LayoutKind,
    /// The body.
    pub statements: Vec<Statement>,
}

impl Layout {
    /// A tagless layout.
    #[must_use]
    pub fn tagless(statements: Vec<Statement>) -> Self {
        Self {
            kind: LayoutKind::Tagless,
            statements,
        }
    }

    /// A wrapped layout.
    #[must_use]
    pub fn wrapped(statements: Vec<Statement>) -> Self {
        Self {
            kind: LayoutKind::Wrapped,
            statements,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_split_their_head() {
        assert_eq!(Expr::path("this"), Expr::This);
        assert_eq!(
            Expr::path("this.a.b"),
            Expr::Path(Box::new(Expr::This), alloc::vec![Rc::from("a"), Rc::from("b")])
        );
        assert_eq!(Expr::path("@title"), Expr::Arg(Rc::from("title")));
        assert_eq!(Expr::path("theme"), Expr::Name(Rc::from("theme")));
        assert!(Expr::path("x.y").is_read());
        assert!(!Expr::lit(1).is_read());
    }
}
