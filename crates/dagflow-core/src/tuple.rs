//! Fixed-arity heterogeneous joins: `tuple_join_2` through `tuple_join_16`,
//! each collecting its futures' results into a `TupleN` struct and
//! short-circuiting on the first error. Generated once via
//! [`dagflow_macros::impl_tuple_joins`] instead of hand-copied per arity.

dagflow_macros::impl_tuple_joins!(16);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::Future;

    #[test]
    fn tuple_join_2_collects_both() {
        let t = tuple_join_2(Future::done(1), Future::done("a".to_string()));
        let (tuple, err) = t.get();
        assert!(err.is_none());
        assert_eq!(tuple.v0, 1);
        assert_eq!(tuple.v1, "a");
    }

    #[test]
    fn tuple_join_short_circuits_on_first_error() {
        let t = tuple_join_3(
            Future::done(1),
            Future::done_err(0, crate::error::Error::Node("bad".into())),
            Future::done(3),
        );
        let (_tuple, err) = t.get();
        assert!(err.is_some());
    }

    #[test]
    fn tuple_join_16_compiles_and_runs() {
        let t = tuple_join_16(
            Future::done(0),
            Future::done(1),
            Future::done(2),
            Future::done(3),
            Future::done(4),
            Future::done(5),
            Future::done(6),
            Future::done(7),
            Future::done(8),
            Future::done(9),
            Future::done(10),
            Future::done(11),
            Future::done(12),
            Future::done(13),
            Future::done(14),
            Future::done(15),
        );
        let (tuple, err) = t.get();
        assert!(err.is_none());
        assert_eq!(tuple.v0, 0);
        assert_eq!(tuple.v15, 15);
    }
}
