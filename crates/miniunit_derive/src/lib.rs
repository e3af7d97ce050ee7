//! Registry macros for MiniUnit fixtures.
//!
//! Rust has no runtime reflection, so fixtures describe themselves at compile time:
//! - `#[fixture]` on an inherent `impl` block implements `miniunit::Fixture` and submits the fixture to the static
//!   registry that `miniunit::InventoryLoader` reads.
//!
//! Recognized method attributes (stripped from the emitted impl):
//! `#[test]`, `#[test(name = "...", skip = "...")]`, `#[setup]`, `#[teardown]`, `#[one_time_setup]`,
//! `#[one_time_teardown]`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{FnArg, ImplItem, ImplItemFn, ItemImpl, LitStr, Meta, Signature, Type, parse_macro_input};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Test,
    SetUp,
    TearDown,
    OneTimeSetUp,
    OneTimeTearDown,
}

impl Role {
    fn from_attr(attr: &syn::Attribute) -> Option<Self> {
        let path = attr.path();
        if path.is_ident("test") {
            Some(Role::Test)
        } else if path.is_ident("setup") {
            Some(Role::SetUp)
        } else if path.is_ident("teardown") {
            Some(Role::TearDown)
        } else if path.is_ident("one_time_setup") {
            Some(Role::OneTimeSetUp)
        } else if path.is_ident("one_time_teardown") {
            Some(Role::OneTimeTearDown)
        } else {
            None
        }
    }

    fn hook_role(self) -> Option<TokenStream2> {
        match self {
            Role::Test => None,
            Role::SetUp => Some(quote!(::miniunit::HookRole::SetUp)),
            Role::TearDown => Some(quote!(::miniunit::HookRole::TearDown)),
            Role::OneTimeSetUp => Some(quote!(::miniunit::HookRole::OneTimeSetUp)),
            Role::OneTimeTearDown => Some(quote!(::miniunit::HookRole::OneTimeTearDown)),
        }
    }
}

struct Marker {
    role: Role,
    name: Option<LitStr>,
    skip: Option<LitStr>,
}

/// How the generated step calls the method.
#[derive(Debug, Clone, Copy)]
enum CallShape {
    Plain,
    WithContext,
    Parameterized(usize),
}

/// Turns an inherent `impl` block into a registered MiniUnit fixture.
///
/// # Example
/// ```ignore
/// #[derive(Default)]
/// struct CalculatorTests {
///     calc: Option<Calculator>,
/// }
///
/// #[fixture]
/// impl CalculatorTests {
///     #[setup]
///     fn set_up(&mut self, ctx: &TestContext) {
///         self.calc = Some(Calculator::default());
///         ctx.write_line("SetUp complete");
///     }
///
///     #[test(name = "Addition works")]
///     fn add_works(&mut self) {
///         assert_eq(5, self.calc.as_ref().unwrap().add(2, 3));
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn fixture(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        return syn::Error::new(proc_macro2::Span::call_site(), "#[fixture] takes no arguments")
            .to_compile_error()
            .into();
    }
    let input = parse_macro_input!(item as ItemImpl);
    match expand_fixture(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_fixture(mut input: ItemImpl) -> syn::Result<TokenStream2> {
    if let Some((_, path, _)) = &input.trait_ {
        return Err(syn::Error::new_spanned(path, "#[fixture] expects an inherent impl block"));
    }
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "#[fixture] does not support generic impl blocks",
        ));
    }

    let self_ty = input.self_ty.as_ref().clone();
    let type_name = type_name(&self_ty)?;

    let mut step_fns = Vec::new();
    let mut registrations = Vec::new();

    for item in &mut input.items {
        let ImplItem::Fn(method) = item else {
            continue;
        };
        let Some(marker) = take_marker(method)? else {
            continue;
        };

        let method_ident = method.sig.ident.clone();
        let method_name = method_ident.to_string();
        let shape = call_shape(&method.sig)?;

        let step_ident = match shape {
            CallShape::Parameterized(_) => None,
            CallShape::Plain | CallShape::WithContext => {
                let step_ident = format_ident!("__miniunit_step_{}", method_ident);
                let args = match shape {
                    CallShape::WithContext => quote!(ctx),
                    _ => quote!(),
                };
                let call = if method.sig.asyncness.is_some() {
                    quote!(fixture.#method_ident(#args).await)
                } else {
                    quote!(fixture.#method_ident(#args))
                };
                step_fns.push(quote! {
                    fn #step_ident<'a>(
                        fixture: &'a mut #self_ty,
                        ctx: &'a ::miniunit::TestContext,
                    ) -> ::miniunit::StepFuture<'a> {
                        let _ = &ctx;
                        ::std::boxed::Box::pin(async move { ::miniunit::IntoStepResult::into_step_result(#call) })
                    }
                });
                Some(step_ident)
            }
        };

        let registration = match (marker.role, step_ident, shape) {
            (Role::Test, Some(step), _) => {
                let display = option_lit(marker.name.as_ref());
                let skip = option_lit(marker.skip.as_ref());
                quote!(.test(#method_name, #display, #skip, #step))
            }
            (Role::Test, None, CallShape::Parameterized(arity)) => {
                quote!(.parameterized_test(#method_name, #arity))
            }
            (role, Some(step), _) => match role.hook_role() {
                Some(hook_role) => quote!(.hook(#hook_role, #method_name, #step)),
                None => continue,
            },
            (role, None, CallShape::Parameterized(arity)) => match role.hook_role() {
                Some(hook_role) => quote!(.parameterized_hook(#hook_role, #method_name, #arity)),
                None => continue,
            },
            (_, None, _) => continue,
        };
        registrations.push(registration);
    }

    Ok(quote! {
        #input

        impl ::miniunit::Fixture for #self_ty {
            fn fixture_type() -> ::miniunit::FixtureType {
                #(#step_fns)*

                ::miniunit::FixtureBuilder::<#self_ty>::new(concat!(module_path!(), "::", #type_name))
                    #(#registrations)*
                    .build()
            }
        }

        ::miniunit::__private::inventory::submit! {
            ::miniunit::FixtureRegistration::new(
                module_path!(),
                <#self_ty as ::miniunit::Fixture>::fixture_type,
            )
        }
    })
}

/// Remove the MiniUnit attribute from `method`, returning what it declared.
fn take_marker(method: &mut ImplItemFn) -> syn::Result<Option<Marker>> {
    let mut found: Option<Marker> = None;
    let mut kept = Vec::with_capacity(method.attrs.len());

    for attr in std::mem::take(&mut method.attrs) {
        let Some(role) = Role::from_attr(&attr) else {
            kept.push(attr);
            continue;
        };
        if found.is_some() {
            return Err(syn::Error::new_spanned(
                &attr,
                "a fixture method may carry only one MiniUnit attribute",
            ));
        }

        let mut marker = Marker {
            role,
            name: None,
            skip: None,
        };
        if let Meta::List(_) = &attr.meta {
            attr.parse_nested_meta(|meta| {
                if role == Role::Test && meta.path.is_ident("name") {
                    marker.name = Some(meta.value()?.parse()?);
                    Ok(())
                } else if role == Role::Test && meta.path.is_ident("skip") {
                    marker.skip = Some(meta.value()?.parse()?);
                    Ok(())
                } else {
                    Err(meta.error("unsupported argument; expected `name = \"...\"` or `skip = \"...\"` on #[test]"))
                }
            })?;
        }
        found = Some(marker);
    }

    method.attrs = kept;
    Ok(found)
}

fn call_shape(sig: &Signature) -> syn::Result<CallShape> {
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "fixture methods cannot be generic",
        ));
    }

    let mut inputs = sig.inputs.iter();
    match inputs.next() {
        Some(FnArg::Receiver(receiver)) if receiver.reference.is_some() => {}
        _ => {
            return Err(syn::Error::new_spanned(
                &sig.ident,
                "fixture methods must take `&self` or `&mut self`",
            ));
        }
    }

    let rest: Vec<&FnArg> = inputs.collect();
    Ok(match rest.as_slice() {
        [] => CallShape::Plain,
        [FnArg::Typed(arg)] if is_context_ref(&arg.ty) => CallShape::WithContext,
        other => CallShape::Parameterized(other.len()),
    })
}

fn is_context_ref(ty: &Type) -> bool {
    let Type::Reference(reference) = ty else {
        return false;
    };
    if reference.mutability.is_some() {
        return false;
    }
    match reference.elem.as_ref() {
        Type::Path(path) => path.path.segments.last().is_some_and(|s| s.ident == "TestContext"),
        _ => false,
    }
}

fn type_name(ty: &Type) -> syn::Result<String> {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .map(|segment| segment.ident.to_string())
            .ok_or_else(|| syn::Error::new_spanned(ty, "expected a named type")),
        _ => Err(syn::Error::new_spanned(ty, "#[fixture] expects a named struct type")),
    }
}

fn option_lit(lit: Option<&LitStr>) -> TokenStream2 {
    match lit {
        Some(lit) => quote!(::std::option::Option::Some(#lit)),
        None => quote!(::std::option::Option::None),
    }
}
