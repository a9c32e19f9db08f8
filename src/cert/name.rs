use x509_parser::der_parser::oid;
use x509_parser::prelude::*;

const STREET_ADDRESS_OID: oid::Oid = oid!(2.5.4 .9);

/// Render a distinguished name as a slash-delimited string such as
/// `/C=CH/O=Starship Factory/CN=example`.
///
/// Attributes appear in a fixed order (country, state or province, locality,
/// street address, organization, organizational unit) with one component per
/// value. The common name always closes the string, even when absent.
pub fn format_distinguished_name(name: &X509Name) -> String {
    let mut formatted = String::new();

    push_components(&mut formatted, "C", name.iter_country());
    push_components(&mut formatted, "SP", name.iter_state_or_province());
    push_components(&mut formatted, "L", name.iter_locality());
    push_components(&mut formatted, "A", name.iter_by_oid(&STREET_ADDRESS_OID));
    push_components(&mut formatted, "O", name.iter_organization());
    push_components(&mut formatted, "OU", name.iter_organizational_unit());

    // Only the last common name counts
    let cn = name
        .iter_common_name()
        .filter_map(|attr| attr.as_str().ok())
        .last()
        .unwrap_or("");
    formatted.push_str("/CN=");
    formatted.push_str(cn);

    formatted
}

fn push_components<'n, 'a: 'n, I>(formatted: &mut String, tag: &str, values: I)
where
    I: Iterator<Item = &'n AttributeTypeAndValue<'a>>,
{
    for value in values.filter_map(|attr| attr.as_str().ok()) {
        formatted.push('/');
        formatted.push_str(tag);
        formatted.push('=');
        formatted.push_str(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEAF_DER: &[u8] = include_bytes!("../../tests/fixtures/leaf-1.der");
    const CA_DER: &[u8] = include_bytes!("../../tests/fixtures/ca.der");

    #[test]
    fn test_format_full_subject() {
        let (_, cert) = X509Certificate::from_der(LEAF_DER).unwrap();
        assert_eq!(
            format_distinguished_name(cert.subject()),
            "/C=CH/SP=Zurich/L=Zurich/O=Starship Factory/OU=Key Service/CN=leaf-1"
        );
    }

    #[test]
    fn test_format_issuer() {
        let (_, cert) = X509Certificate::from_der(LEAF_DER).unwrap();
        assert_eq!(
            format_distinguished_name(cert.issuer()),
            "/C=CH/O=Starship Factory/CN=Test CA"
        );
    }

    #[test]
    fn test_self_signed_subject_equals_issuer() {
        let (_, cert) = X509Certificate::from_der(CA_DER).unwrap();
        assert_eq!(
            format_distinguished_name(cert.subject()),
            format_distinguished_name(cert.issuer())
        );
    }
}
