//! Proc-macro codegen for dagflow's fixed-arity tuple-join family.
//!
//! `tuple_join_N` for `N in 2..=16` is pure boilerplate: fifteen near-identical
//! functions that only differ in arity. `impl_tuple_joins!(16)` expands, at
//! the call site, into `TupleN` result structs and `tuple_join_2..tuple_join_N`
//! functions sharing one body instead of reproducing them by hand. This one
//! is function-like (it generates items, not an attribute passthrough) since
//! there's no single function to decorate.
//!
//! Expanded code references `crate::handle::{Future, Promise}` and
//! `crate::error::Error`, so this macro is meant to be invoked from within
//! `dagflow-core` itself (see `dagflow-core::combinators::tuple_join`).

use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, LitInt};

#[proc_macro]
pub fn impl_tuple_joins(input: TokenStream) -> TokenStream {
    let max_lit = parse_macro_input!(input as LitInt);
    let max: usize = max_lit
        .base10_parse()
        .expect("impl_tuple_joins!(N) expects a literal arity, e.g. impl_tuple_joins!(16)");

    let mut generated = Vec::with_capacity(max.saturating_sub(1));

    for n in 2..=max {
        let type_params: Vec<_> = (0..n).map(|i| format_ident!("T{i}")).collect();
        let field_names: Vec<_> = (0..n).map(|i| format_ident!("v{i}")).collect();
        let fn_args: Vec<_> = (0..n).map(|i| format_ident!("f{i}")).collect();
        let slot_names: Vec<_> = (0..n).map(|i| format_ident!("slot{i}")).collect();
        let struct_name = format_ident!("Tuple{n}");
        let fn_name = format_ident!("tuple_join_{n}");

        let struct_def = quote! {
            /// Heterogeneous fixed-arity join result.
            #[derive(Debug, Clone, Default)]
            pub struct #struct_name<#(#type_params: Clone + Default + Send + 'static),*> {
                #(pub #field_names: #type_params),*
            }
        };

        let slot_decls = quote! {
            #(
                let #slot_names: std::sync::Arc<std::sync::Mutex<Option<#type_params>>> =
                    std::sync::Arc::new(std::sync::Mutex::new(None));
            )*
        };

        let mut subscriptions = Vec::with_capacity(n);
        for i in 0..n {
            let fn_arg = &fn_args[i];
            let my_slot = &slot_names[i];
            let all_slot_clones = slot_names.iter().map(|s| quote! { let #s = #s.clone(); });
            subscriptions.push(quote! {
                {
                    let promise = promise.clone();
                    let errored = errored.clone();
                    let remaining = remaining.clone();
                    #(#all_slot_clones)*
                    #fn_arg.subscribe(move |val, err| {
                        if let Some(e) = err {
                            if !errored.swap(true, std::sync::atomic::Ordering::AcqRel) {
                                promise.set_safe(Default::default(), Some(e));
                            }
                            return;
                        }
                        *#my_slot.lock().unwrap() = Some(val);
                        if remaining.fetch_sub(1, std::sync::atomic::Ordering::AcqRel) == 1
                            && !errored.load(std::sync::atomic::Ordering::Acquire)
                        {
                            let tuple = #struct_name {
                                #(
                                    #field_names: #slot_names
                                        .lock()
                                        .unwrap()
                                        .take()
                                        .expect("every slot filled once remaining hits 0")
                                ),*
                            };
                            promise.set_safe(tuple, None);
                        }
                    });
                }
            });
        }

        let doc = format!(
            "Joins {n} futures of possibly-different types into one [`{struct_name}`], \
             short-circuiting to the first error exactly like `join_all`."
        );

        let fn_def = quote! {
            #[doc = #doc]
            pub fn #fn_name<#(#type_params: Clone + Default + Send + 'static),*>(
                #(#fn_args: crate::handle::Future<#type_params>),*
            ) -> crate::handle::Future<#struct_name<#(#type_params),*>> {
                let promise = crate::handle::Promise::<#struct_name<#(#type_params),*>>::new();
                let future = promise.future();
                let errored = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
                let remaining = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(#n));
                #slot_decls
                #(#subscriptions)*
                future
            }
        };

        generated.push(quote! {
            #struct_def
            #fn_def
        });
    }

    quote! { #(#generated)* }.into()
}
