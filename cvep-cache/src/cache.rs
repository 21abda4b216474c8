use lazy_static::lazy_static;
use std::sync::RwLock;
pub use string_cache::DefaultAtom as Atom;

lazy_static! {
    static ref TEXT_INTERNER: RwLock<Vec<Atom>> = RwLock::new(Vec::new());
}

/// Intern a key label or status line and return its id.
///
/// Ids are stable for the lifetime of the process, so renderers can key
/// glyph caches by id instead of by string.
pub fn intern_text(s: &str) -> usize {
    let atom = Atom::from(s);
    if let Some(idx) = read().iter().position(|a| *a == atom) {
        return idx;
    }
    let mut v = TEXT_INTERNER.write().unwrap_or_else(|e| e.into_inner());
    match v.iter().position(|a| *a == atom) {
        Some(idx) => idx,
        None => {
            v.push(atom);
            v.len() - 1
        }
    }
}

#[cfg(test)]
fn text_count() -> usize {
    read().len()
}

pub fn get_text(id: usize) -> Option<Atom> {
    read().get(id).cloned()
}

fn read() -> std::sync::RwLockReadGuard<'static, Vec<Atom>> {
    TEXT_INTERNER.read().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let a = intern_text("Waiting to start");
        let b = intern_text("Waiting to start");
        let c = intern_text("<-");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(get_text(c).as_deref(), Some("<-"));
        assert!(text_count() >= 2);
        assert!(get_text(usize::MAX).is_none());
    }
}
