use std::fmt;

use crate::util::intern::Interner;

pub mod error;
pub mod tree;

/// Whatever is needed to display compiler values in source terms. Names are
/// stored as interned handles, so they can only be printed through the
/// interner which produced them.
#[derive(Clone, Copy)]
pub struct Context<'ident> {
    pub ident_interner: &'ident Interner<str>,
}

impl<'ident> Context<'ident> {
    pub fn new(ident_interner: &'ident Interner<str>) -> Context<'ident> {
        Context { ident_interner }
    }
}

/// Analogous to [`std::fmt::Display`], but also receives the [`Context`].
///
/// Errors implement it so that the alternate flag (`{:#}`) prefixes the
/// message with its span.
pub trait Show {
    fn show(&self, f: &mut fmt::Formatter<'_>, ctx: &Context<'_>) -> fmt::Result;

    /// Returns a type which can be displayed.
    fn display<'a>(&'a self, ctx: &'a Context<'a>) -> impl fmt::Display + 'a
    where
        Self: Sized,
    {
        Display(self, ctx)
    }
}

struct Display<'a, T: Show>(&'a T, &'a Context<'a>);

impl<T: Show> fmt::Display for Display<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Display(this, ctx) = self;
        this.show(f, ctx)
    }
}
