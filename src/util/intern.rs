use std::{collections::HashMap, fmt, hash::Hash, marker::PhantomData, num::NonZeroU32, rc::Rc};

/// A handle to some interned value of type `T`. To retrieve a `&T`, use
/// [`Interner::get`].
///
/// Handles are only meaningful for the interner which produced them. Every
/// identifier of a compilation (functions, parameters, fields, aliases and
/// annotations) shares a single interner.
pub struct Interned<T: ?Sized> {
    // Non-zero, so that `Option<Interned<T>>` is as small as the handle.
    handle: NonZeroU32,
    _ty: PhantomData<T>,
}

impl<T: ?Sized> Interned<T> {
    const fn new(handle: NonZeroU32) -> Self {
        Interned {
            handle,
            _ty: PhantomData,
        }
    }

    fn index(self) -> usize {
        self.handle.get() as usize - 1
    }
}

impl<T: ?Sized> Copy for Interned<T> {}

impl<T: ?Sized> Clone for Interned<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Hash for Interned<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.handle.hash(state);
    }
}

impl<T: ?Sized> PartialEq for Interned<T> {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl<T: ?Sized> Eq for Interned<T> {}

impl<T: ?Sized> fmt::Debug for Interned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Interned({})", self.handle)
    }
}

impl<T: ?Sized> From<&Interned<T>> for Interned<T> {
    fn from(value: &Interned<T>) -> Self {
        *value
    }
}

pub struct Interner<T: ?Sized> {
    map: HashMap<Rc<T>, Interned<T>>,
    vec: Vec<Rc<T>>,
}

impl fmt::Debug for Interner<str> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.vec.iter()).finish()
    }
}

impl<T: ?Sized> Interner<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Interner {
            map: HashMap::with_capacity(capacity),
            vec: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.vec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }

    /// Interns the provided value, returning a handle which can be used to
    /// retrieve it later.
    pub fn intern(&mut self, value: &T) -> Interned<T>
    where
        T: Eq + Hash + ToOwned,
        T::Owned: Into<Rc<T>>,
    {
        if let Some(&interned) = self.map.get(value) {
            return interned;
        }
        let len = u32::try_from(self.vec.len()).expect("interned out of capacity");
        let interned = Interned::new(NonZeroU32::MIN.saturating_add(len));
        let key: Rc<T> = value.to_owned().into();
        self.vec.push(Rc::clone(&key));
        self.map.insert(key, interned);
        interned
    }

    /// Returns the handle of an already interned value, without interning
    /// it. Used once the interner is frozen, during code generation.
    pub fn lookup(&self, value: &T) -> Option<Interned<T>>
    where
        T: Eq + Hash,
    {
        self.map.get(value).copied()
    }

    /// Returns the corresponding value for the provided [`Interned`] handle.
    /// Panics if the handle comes from another interner.
    pub fn get(&self, handle: impl Into<Interned<T>>) -> &T {
        &self.vec[handle.into().index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn interning_is_idempotent() {
        let mut i = Interner::<str>::with_capacity(3);

        let main1 = i.intern("main");
        let length1 = i.intern("length");
        let main2 = i.intern("main");
        let length2 = i.intern("length");

        assert_eq!(main1, main2);
        assert_eq!(length1, length2);
        assert_ne!(main1, length1);
        assert_eq!(i.get(main1), "main");
        assert_eq!(i.get(length2), "length");
        assert_eq!(i.len(), 2);
    }

    #[test]
    fn lookup_does_not_intern() {
        let mut i = Interner::<str>::with_capacity(1);
        assert_eq!(i.lookup("length"), None);
        assert!(i.is_empty());

        let length = i.intern("length");
        assert_eq!(i.lookup("length"), Some(length));
        assert_eq!(i.len(), 1);
    }
}
