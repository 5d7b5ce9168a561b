use syn::{GenericArgument, PathArguments, Type};

///
/// Outer
///
/// Outer shape of a field type, read from its last path segment.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outer {
    Single,
    Sequence,
    Map,
}

const SEQUENCES: [&str; 3] = ["Vec", "BTreeSet", "HashSet"];
const MAPS: [&str; 2] = ["BTreeMap", "HashMap"];
const WRAPPERS: [&str; 2] = ["Option", "Box"];

// outer
pub fn outer(ty: &Type) -> Outer {
    let ty = unwrap_wrappers(ty);

    match last_ident(ty).as_deref() {
        Some(name) if SEQUENCES.contains(&name) => Outer::Sequence,
        Some(name) if MAPS.contains(&name) => Outer::Map,
        _ => Outer::Single,
    }
}

/// Mapped type behind `Option` / `Box` wrappers and one collection layer.
/// Maps yield their value type.
pub fn element(ty: &Type) -> &Type {
    let ty = unwrap_wrappers(ty);

    let inner = match outer(ty) {
        Outer::Single => return ty,
        Outer::Sequence => generic_args(ty).into_iter().next(),
        Outer::Map => generic_args(ty).into_iter().nth(1),
    };

    inner.map_or(ty, unwrap_wrappers)
}

fn unwrap_wrappers(mut ty: &Type) -> &Type {
    while let Some(name) = last_ident(ty)
        && WRAPPERS.contains(&name.as_str())
    {
        match generic_args(ty).into_iter().next() {
            Some(inner) => ty = inner,
            None => break,
        }
    }

    ty
}

fn last_ident(ty: &Type) -> Option<String> {
    let Type::Path(path) = ty else {
        return None;
    };

    path.path.segments.last().map(|s| s.ident.to_string())
}

fn generic_args(ty: &Type) -> Vec<&Type> {
    let Type::Path(path) = ty else {
        return Vec::new();
    };
    let Some(segment) = path.path.segments.last() else {
        return Vec::new();
    };
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return Vec::new();
    };

    args.args
        .iter()
        .filter_map(|arg| match arg {
            GenericArgument::Type(ty) => Some(ty),
            _ => None,
        })
        .collect()
}

///
/// TESTS
///
