//! Statement preparation.
//!
//! A [`Query`] is a routine body plus the parameters it will run with.
//! [`Query::prepare`] produces the SQL and [`Bindings`] handed to a
//! [`Database`](crate::Database):
//!
//! - [`Query::Positional`] rewrites the k-th `?` to `:arg{k}` and binds
//!   `arg{k}` to the k-th argument.
//! - [`Query::Named`] leaves the body alone; it is expected to use `:name`
//!   markers.
//! - [`Query::Raw`] passes body and arguments through untouched for drivers
//!   that accept `?` natively.
//!
//! ```
//! use sqlmill_core::{Bindings, Query, Value};
//!
//! let prepared = Query::sql(
//!     "SELECT * FROM u WHERE id=? AND name=?",
//!     vec![Value::from(7), Value::from("a")],
//! )
//! .prepare();
//! assert_eq!(prepared.sql, "SELECT * FROM u WHERE id=:arg0 AND name=:arg1");
//! let Bindings::Named(params) = prepared.bindings else { unreachable!() };
//! assert_eq!(params["arg0"], Value::from(7));
//! assert_eq!(params["arg1"], Value::from("a"));
//! ```

use serde::Serialize;

use crate::database::Bindings;
use crate::error::Result;
use crate::params::to_params;
use crate::value::{Params, Value};

/// A routine body bound to its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Positional { body: String, args: Vec<Value> },
    Named { body: String, params: Params },
    Raw { body: String, args: Vec<Value> },
}

/// SQL ready for a driver.
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    pub sql: String,
    pub bindings: Bindings,
}

impl Query {
    /// A body with `?` markers bound in order to `args`.
    pub fn sql(body: impl Into<String>, args: Vec<Value>) -> Self {
        Query::Positional {
            body: body.into(),
            args,
        }
    }

    /// A body with `:name` markers bound from `params`.
    pub fn named(body: impl Into<String>, params: Params) -> Self {
        Query::Named {
            body: body.into(),
            params,
        }
    }

    /// A body with `:name` markers bound from the fields of `record`.
    ///
    /// See [`to_params`] for how fields map to names.
    pub fn named_from<T: Serialize + ?Sized>(body: impl Into<String>, record: &T) -> Result<Self> {
        Ok(Query::named(body, to_params(record)?))
    }

    /// A body handed to the driver verbatim with positional `args`.
    pub fn raw(body: impl Into<String>, args: Vec<Value>) -> Self {
        Query::Raw {
            body: body.into(),
            args,
        }
    }

    pub fn body(&self) -> &str {
        match self {
            Query::Positional { body, .. } | Query::Named { body, .. } | Query::Raw { body, .. } => {
                body
            }
        }
    }

    pub fn prepare(&self) -> Prepared {
        match self {
            Query::Positional { body, args } => prepare_positional(body, args),
            Query::Named { body, params } => Prepared {
                sql: body.clone(),
                bindings: Bindings::Named(params.clone()),
            },
            Query::Raw { body, args } => Prepared {
                sql: body.clone(),
                bindings: Bindings::Positional(args.clone()),
            },
        }
    }
}

fn prepare_positional(body: &str, args: &[Value]) -> Prepared {
    if args.is_empty() {
        return Prepared {
            sql: body.to_string(),
            bindings: Bindings::Named(Params::new()),
        };
    }

    let mut sql = String::with_capacity(body.len() + 8);
    let mut params = Params::new();
    for (k, part) in body.split('?').enumerate() {
        if k > 0 {
            let index = k - 1;
            let name = format!("arg{index}");
            sql.push(':');
            sql.push_str(&name);
            if let Some(value) = args.get(index) {
                params.insert(name, value.clone());
            }
        }
        sql.push_str(part);
    }

    Prepared {
        sql,
        bindings: Bindings::Named(params),
    }
}


#[cfg(test)]
mod proptests {
    use proptest::prelude::*;
    use proptest::{prop_assert, prop_assert_eq, proptest};

    use super::*;

    proptest! {
        #[test]
        fn proptest_positional_rewrite(
            parts in prop::collection::vec("[a-zA-Z0-9 =,()*']{0,12}", 2..8)
        ) {
            let body = parts.join("?");
            let args: Vec<Value> = (0..parts.len() - 1).map(|i| Value::from(i as i64)).collect();
            let prepared = Query::sql(body, args.clone()).prepare();

            let mut expected = parts[0].clone();
            for (k, part) in parts.iter().enumerate().skip(1) {
                expected.push_str(&format!(":arg{}{}", k - 1, part));
            }
            prop_assert_eq!(&prepared.sql, &expected);

            let Bindings::Named(params) = &prepared.bindings else {
                panic!("expected named bindings");
            };
            prop_assert_eq!(params.len(), args.len());
            for (k, arg) in args.iter().enumerate() {
                prop_assert_eq!(&params[&format!("arg{k}")], arg);
            }

            let again = Query::sql(prepared.sql.clone(), vec![]).prepare();
            prop_assert_eq!(again.sql, prepared.sql);
            prop_assert!(again.bindings.is_empty());
        }
    }
}
