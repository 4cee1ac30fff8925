use quote::quote;
use syn::*;

/// Automatically implements `BspValue` on structs with named fields. Fields are read and written in declaration order, and the struct size is
/// the sum of the field sizes, so the struct must mirror the on-disk layout exactly.
#[proc_macro_derive(BspValue)]
pub fn bsp_value_derive(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
	let input = parse_macro_input!(input as DeriveInput);
	let ident = input.ident;
	let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

	let fields = match input.data {
		Data::Struct(data) => match data.fields {
			Fields::Named(fields) => fields.named,
			Fields::Unnamed(_) => panic!("Tuple structs not supported"),
			Fields::Unit => panic!("Unit structs not supported"),
		},
		_ => panic!("Only structs with named fields are supported"),
	};

	let types = fields.iter().map(|field| &field.ty);
	let field_names: Vec<_> = fields.iter().map(|field| field.ident.as_ref().expect("Ident required")).collect();

	quote! {
		impl #impl_generics ::anybsp::reader::BspValue for #ident #ty_generics #where_clause {
			fn bsp_parse(reader: &mut ::anybsp::reader::BspByteReader) -> ::anybsp::BspResult<Self> {
				Ok(Self {
					#(
						#field_names: ::anybsp::BspResultDoingJobExt::job(::anybsp::reader::BspValue::bsp_parse(reader), concat!(
							"Reading field \"",
							stringify!(#field_names),
							"\" on type ",
							stringify!(#ident)
						))?,
					)*
				})
			}

			fn bsp_write(&self, writer: &mut ::anybsp::reader::BspByteWriter) {
				#( ::anybsp::reader::BspValue::bsp_write(&self.#field_names, writer); )*
			}

			fn bsp_struct_size() -> usize {
				#(<#types as ::anybsp::reader::BspValue>::bsp_struct_size() + )* 0
			}
		}
	}
	.into()
}
