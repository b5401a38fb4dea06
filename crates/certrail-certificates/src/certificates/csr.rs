//! Certificate signing requests and private key material.
//!
//! OpenSSL generates keys and signs. The request structure is assembled
//! with `x509-cert` because the extension set has to be attached twice,
//! under PKCS#9 `extensionRequest` and under Microsoft's `msExtReq`, which
//! `X509ReqBuilder` cannot express.

use openssl::hash::MessageDigest;
use openssl::pkey::{Id, PKey, Private};
use openssl::rsa::Rsa;
use openssl::sign::Signer;
use std::str::FromStr;
use x509_cert::attr::Attribute;
use x509_cert::der::asn1::{Any, BitString, Ia5String, Null, OctetString, SetOfVec};
use x509_cert::der::oid::{AssociatedOid, ObjectIdentifier};
use x509_cert::der::{Decode, Encode};
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{BasicConstraints, KeyUsage, KeyUsages, SubjectAltName};
use x509_cert::ext::Extension;
use x509_cert::name::Name;
use x509_cert::request::{CertReq, CertReqInfo, Version};
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use super::errors::CsrError;

const EXTENSION_REQUEST: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.14");
const MS_EXTENSION_REQUEST: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.2.1.14");
const SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
const ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");

/// A signed PKCS#10 request ready to hand to the CA
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateSigningRequest {
    /// Subject common name first, then every alternative name
    pub domains: Vec<String>,
    pub der: Vec<u8>,
}

/// Generate an RSA private key, PKCS#8 PEM encoded
pub fn generate_private_key(bits: u32) -> Result<String, CsrError> {
    let rsa = Rsa::generate(bits)?;
    let pkey = PKey::from_rsa(rsa)?;
    let pem = pkey.private_key_to_pem_pkcs8()?;
    Ok(String::from_utf8_lossy(&pem).into_owned())
}

/// Build a SHA-256 signed request for `domain`.
///
/// The subject carries only the common name. Alternative names go into a
/// subjectAltName extension that deliberately leaves the primary domain out.
pub fn build_csr(
    domain: &str,
    alternative_names: &[String],
    private_key_pem: &str,
) -> Result<CertificateSigningRequest, CsrError> {
    if domain.is_empty() || !domain.is_ascii() {
        return Err(CsrError::InvalidName(domain.to_string()));
    }
    for name in alternative_names {
        if name.is_empty() || !name.is_ascii() {
            return Err(CsrError::InvalidName(name.clone()));
        }
    }

    let pkey = PKey::private_key_from_pem(private_key_pem.as_bytes())?;
    let algorithm = signature_algorithm(&pkey)?;

    let extensions = Any::encode_from(&requested_extensions(alternative_names)?)?;
    let attributes = SetOfVec::try_from(vec![
        Attribute {
            oid: EXTENSION_REQUEST,
            values: SetOfVec::try_from(vec![extensions.clone()])?,
        },
        Attribute {
            oid: MS_EXTENSION_REQUEST,
            values: SetOfVec::try_from(vec![extensions])?,
        },
    ])?;

    let subject = Name::from_str(&format!("CN={}", domain))
        .map_err(|_| CsrError::InvalidName(domain.to_string()))?;

    let info = CertReqInfo {
        version: Version::V1,
        subject,
        public_key: SubjectPublicKeyInfoOwned::from_der(&pkey.public_key_to_der()?)?,
        attributes,
    };

    let mut signer = Signer::new(MessageDigest::sha256(), &pkey)?;
    signer.update(&info.to_der()?)?;
    let signature = signer.sign_to_vec()?;

    let request = CertReq {
        info,
        algorithm,
        signature: BitString::from_bytes(&signature)?,
    };

    let domains = std::iter::once(domain.to_string())
        .chain(alternative_names.iter().cloned())
        .collect();

    Ok(CertificateSigningRequest {
        domains,
        der: request.to_der()?,
    })
}

fn signature_algorithm(pkey: &PKey<Private>) -> Result<AlgorithmIdentifierOwned, CsrError> {
    match pkey.id() {
        Id::RSA => Ok(AlgorithmIdentifierOwned {
            oid: SHA256_WITH_RSA,
            parameters: Some(Any::encode_from(&Null)?),
        }),
        Id::EC => Ok(AlgorithmIdentifierOwned {
            oid: ECDSA_WITH_SHA256,
            parameters: None,
        }),
        _ => Err(CsrError::UnsupportedKey),
    }
}

fn requested_extensions(alternative_names: &[String]) -> Result<Vec<Extension>, CsrError> {
    let key_usage = KeyUsage(
        KeyUsages::DigitalSignature | KeyUsages::NonRepudiation | KeyUsages::KeyEncipherment,
    );

    let mut extensions = vec![
        extension(
            BasicConstraints::OID,
            &BasicConstraints {
                ca: false,
                path_len_constraint: None,
            },
        )?,
        extension(KeyUsage::OID, &key_usage)?,
    ];

    if !alternative_names.is_empty() {
        let names = alternative_names
            .iter()
            .map(|name| Ok(GeneralName::DnsName(Ia5String::new(name.as_str())?)))
            .collect::<Result<Vec<_>, CsrError>>()?;
        extensions.push(extension(SubjectAltName::OID, &SubjectAltName(names))?);
    }

    Ok(extensions)
}

fn extension(oid: ObjectIdentifier, value: &impl Encode) -> Result<Extension, CsrError> {
    Ok(Extension {
        extn_id: oid,
        critical: false,
        extn_value: OctetString::new(value.to_der()?)?,
    })
}
