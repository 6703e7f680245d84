//! Pulls the SAML assertion out of the Okta landing page and reads the AWS
//! role linkage from it.

use base64::{engine::general_purpose::STANDARD, Engine};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::common::{ArnPair, FederationAssertion};
use crate::error::{LoginError, LoginResult};
use crate::idp::form::HtmlForm;

/// Form field carrying the assertion on the Okta landing page
pub const SAML_RESPONSE_FIELD: &str = "SAMLResponse";

/// SAML attribute listing `PrincipalArn,RoleArn` pairs
pub const AWS_ROLE_ATTRIBUTE: &str = "https://aws.amazon.com/SAML/Attributes/Role";

/// Find the `SAMLResponse` input on a page.
///
/// `None` means the page is not an authenticated landing page (for example
/// the login form served for an expired session).
pub fn extract_token(html: &str) -> Option<FederationAssertion> {
    HtmlForm::parse(html)
        .input_value(SAML_RESPONSE_FIELD)
        .filter(|value| !value.trim().is_empty())
        .map(|value| FederationAssertion(value.to_string()))
}

/// Decode the assertion and read the principal and role ARNs from the first
/// value of the AWS role attribute.
pub fn decode(assertion: &FederationAssertion) -> LoginResult<ArnPair> {
    let compact: String = assertion
        .as_str()
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| LoginError::malformed_assertion(format!("base64 decode failed: {e}")))?;
    let xml = String::from_utf8(bytes)
        .map_err(|e| LoginError::malformed_assertion(format!("invalid UTF-8: {e}")))?;

    let value = role_attribute_value(&xml)?.ok_or_else(|| {
        LoginError::malformed_assertion(format!("no value for attribute {AWS_ROLE_ATTRIBUTE}"))
    })?;

    parse_arn_pair(&value)
}

/// Split `PrincipalArn,RoleArn`
pub fn parse_arn_pair(value: &str) -> LoginResult<ArnPair> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    match parts.as_slice() {
        [principal, role, ..] if !principal.is_empty() && !role.is_empty() => Ok(ArnPair {
            role_arn: role.to_string(),
            principal_arn: principal.to_string(),
        }),
        _ => Err(LoginError::malformed_assertion(format!(
            "expected 'PrincipalArn,RoleArn' in role attribute, got '{value}'"
        ))),
    }
}

/// First `AttributeValue` text of the role attribute, if the attribute exists
fn role_attribute_value(xml: &str) -> LoginResult<Option<String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut found_attribute = false;
    let mut in_role_attribute = false;
    let mut in_value = false;
    let mut value = String::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| LoginError::malformed_assertion(format!("invalid XML: {e}")))?;

        match event {
            Event::Start(e) => match e.local_name().as_ref() {
                b"Attribute" => {
                    let name = e
                        .try_get_attribute("Name")
                        .map_err(|err| {
                            LoginError::malformed_assertion(format!("invalid XML attribute: {err}"))
                        })?
                        .map(|attr| attr.unescape_value().map(|v| v.into_owned()))
                        .transpose()
                        .map_err(|err| {
                            LoginError::malformed_assertion(format!("invalid XML attribute: {err}"))
                        })?;
                    in_role_attribute = name.as_deref() == Some(AWS_ROLE_ATTRIBUTE);
                    found_attribute |= in_role_attribute;
                }
                b"AttributeValue" if in_role_attribute => in_value = true,
                _ => {}
            },
            Event::Text(text) if in_value => {
                let text = text
                    .unescape()
                    .map_err(|e| LoginError::malformed_assertion(format!("invalid XML text: {e}")))?;
                value.push_str(&text);
            }
            Event::CData(data) if in_value => {
                value.push_str(&String::from_utf8_lossy(&data));
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"AttributeValue" if in_value => return Ok(Some(value.trim().to_string())),
                b"Attribute" => in_role_attribute = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if found_attribute {
        Ok(None)
    } else {
        Err(LoginError::malformed_assertion(format!(
            "attribute {AWS_ROLE_ATTRIBUTE} not found"
        )))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn assertion_xml(role_values: &[&str]) -> String {
        let values: String = role_values
            .iter()
            .map(|v| {
                format!(
                    r#"<saml2:AttributeValue xmlns:xs="http://www.w3.org/2001/XMLSchema" xsi:type="xs:string">{v}</saml2:AttributeValue>"#
                )
            })
            .collect();

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<saml2p:Response xmlns:saml2p="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <saml2:Assertion xmlns:saml2="urn:oasis:names:tc:SAML:2.0:assertion">
    <saml2:AttributeStatement>
      <saml2:Attribute Name="https://aws.amazon.com/SAML/Attributes/RoleSessionName">
        <saml2:AttributeValue>jdoe@example.com</saml2:AttributeValue>
      </saml2:Attribute>
      <saml2:Attribute Name="https://aws.amazon.com/SAML/Attributes/Role" NameFormat="urn:oasis:names:tc:SAML:2.0:attrname-format:uri">
        {values}
      </saml2:Attribute>
    </saml2:AttributeStatement>
  </saml2:Assertion>
</saml2p:Response>"#
        )
    }

    /// Base64 encoded assertion carrying the given role attribute values
    pub(crate) fn encoded_assertion(role_values: &[&str]) -> FederationAssertion {
        FederationAssertion(STANDARD.encode(assertion_xml(role_values)))
    }

    #[test]
    fn test_decode_role_and_principal() {
        let assertion = encoded_assertion(&[
            "arn:aws:iam::111:saml-provider/X,arn:aws:iam::111:role/Y",
        ]);

        let arns = decode(&assertion).unwrap();
        assert_eq!(arns.principal_arn, "arn:aws:iam::111:saml-provider/X");
        assert_eq!(arns.role_arn, "arn:aws:iam::111:role/Y");
    }

    #[test]
    fn test_decode_uses_first_value() {
        let assertion = encoded_assertion(&[
            "arn:aws:iam::111:saml-provider/X,arn:aws:iam::111:role/First",
            "arn:aws:iam::111:saml-provider/X,arn:aws:iam::111:role/Second",
        ]);
        assert_eq!(decode(&assertion).unwrap().role_arn, "arn:aws:iam::111:role/First");
    }

    #[test]
    fn test_decode_ignores_line_wrapping() {
        let encoded = encoded_assertion(&["p,r/x"]).0;
        let wrapped: String = encoded
            .as_bytes()
            .chunks(76)
            .map(|chunk| format!("{}\r\n", std::str::from_utf8(chunk).unwrap()))
            .collect();

        let arns = decode(&FederationAssertion(wrapped)).unwrap();
        assert_eq!(arns.role_arn, "r/x");
    }

    #[test]
    fn test_decode_missing_role_attribute() {
        let xml = r#"<Response><Assertion><Attribute Name="other"><AttributeValue>a,b</AttributeValue></Attribute></Assertion></Response>"#;
        let err = decode(&FederationAssertion(STANDARD.encode(xml))).unwrap_err();
        assert!(matches!(err, LoginError::MalformedAssertion { .. }));
    }

    #[test]
    fn test_decode_single_component() {
        let err = decode(&encoded_assertion(&["arn:aws:iam::111:role/OnlyRole"])).unwrap_err();
        assert!(matches!(err, LoginError::MalformedAssertion { .. }));
    }

    #[test]
    fn test_decode_bad_base64() {
        let err = decode(&FederationAssertion("not base64 at all!".to_string())).unwrap_err();
        assert!(matches!(err, LoginError::MalformedAssertion { .. }));
    }

    #[test]
    fn test_parse_arn_pair_rejects_empty_parts() {
        assert!(parse_arn_pair(",arn:aws:iam::111:role/Y").is_err());
        assert!(parse_arn_pair("arn:aws:iam::111:saml-provider/X,").is_err());
        assert!(parse_arn_pair("").is_err());
    }

    #[test]
    fn test_extract_token() {
        let page = r#"<html><body><form method="POST" action="https://signin.aws.amazon.com/saml">
            <input name="SAMLResponse" type="hidden" value="PHNhbWw&#x2b;"/>
            <input name="RelayState" type="hidden" value=""/>
        </form></body></html>"#;
        assert_eq!(
            extract_token(page),
            Some(FederationAssertion("PHNhbWw+".to_string()))
        );
    }

    #[test]
    fn test_extract_token_absent() {
        let login_page = r#"<form action="/login/do-login"><input name="username"><input name="password"></form>"#;
        assert_eq!(extract_token(login_page), None);
    }

    #[test]
    fn test_extract_token_ignores_script_templates() {
        let expired_page = r#"<html><head><script>
            var tpl = '<input name="SAMLResponse" value="stale">';
            </script></head><body>
            <form action="/login/do-login"><input name="username"><input name="password"></form>
            </body></html>"#;
        assert_eq!(extract_token(expired_page), None);
    }

    #[test]
    fn test_extract_token_exact_name_only() {
        let page = r#"<input name="samlresponse" value="abc"><input name="SAMLResponseX" value="def">"#;
        assert_eq!(extract_token(page), None);
    }
}
