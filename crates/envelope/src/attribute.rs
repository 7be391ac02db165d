//! Encrypted attributes: a plaintext view over a ciphertext field.
//!
//! An [`EncryptedAttribute`] pairs an accessor for the field that stores the
//! token with an [`Encryptor`] and a context resolver. `set` encrypts and
//! stores, `get` reads and decrypts. `None` and empty strings are stored and
//! returned verbatim without touching the engine.
//!
//! ```ignore
//! struct User { ssn_enc: Option<String>, tenant: String }
//!
//! let ssn = EncryptedAttribute::builder(
//!         |u: &User| u.ssn_enc.as_deref(),
//!         |u: &mut User, v| u.ssn_enc = v,
//!     )
//!     .provider(provider)
//!     .context_fn(|u: &User| Some(EncryptionContext::from([("tenant", u.tenant.as_str())])))
//!     .build()?;
//!
//! ssn.set(&mut user, Some("123-45-6789")).await?;
//! assert_eq!(ssn.get(&user).await?.as_deref(), Some("123-45-6789"));
//! ```

use std::sync::Arc;

use crate::context::EncryptionContext;
use crate::encryptor::Encryptor;
use crate::error::Error;
use crate::kek::KekProvider;

/// Reads the stored token from the owning value.
pub type ReadField<T> = fn(&T) -> Option<&str>;

/// Writes a token (or a pass-through value) into the owning value.
pub type WriteField<T> = fn(&mut T, Option<String>);

/// Resolves the encryption context for an instance at call time.
pub type ContextResolver<T> = Arc<dyn Fn(&T) -> Option<EncryptionContext> + Send + Sync>;

/// A plaintext accessor backed by an encrypted field of `T`.
pub struct EncryptedAttribute<T> {
    encryptor: Encryptor,
    context: ContextResolver<T>,
    read: ReadField<T>,
    write: WriteField<T>,
}

impl<T> Clone for EncryptedAttribute<T> {
    fn clone(&self) -> Self {
        Self {
            encryptor: self.encryptor.clone(),
            context: self.context.clone(),
            read: self.read,
            write: self.write,
        }
    }
}

impl<T: 'static> EncryptedAttribute<T> {
    /// Start building an attribute over the field reached by `read`/`write`.
    pub fn builder(read: ReadField<T>, write: WriteField<T>) -> AttributeBuilder<T> {
        AttributeBuilder {
            read,
            write,
            encryptor: None,
            context: None,
        }
    }

    /// Encrypt `value` with the instance's context and store the token.
    ///
    /// `None` and `""` are stored as given.
    pub async fn set(&self, target: &mut T, value: Option<&str>) -> Result<(), Error> {
        let context = self.resolve(target, value);
        let stored = self.encryptor.encrypt_field(value, context.as_ref()).await?;
        (self.write)(target, stored);
        Ok(())
    }

    /// Read the stored token and decrypt it with the instance's current context.
    ///
    /// `None` and `""` are returned as stored.
    pub async fn get(&self, target: &T) -> Result<Option<String>, Error> {
        let token = (self.read)(target);
        let context = self.resolve(target, token);
        self.encryptor.decrypt_field(token, context.as_ref()).await
    }

    pub fn encryptor(&self) -> &Encryptor {
        &self.encryptor
    }

    // The resolver only runs when the engine will be invoked.
    fn resolve(&self, target: &T, value: Option<&str>) -> Option<EncryptionContext> {
        match value {
            None | Some("") => None,
            Some(_) => (self.context)(target),
        }
    }
}

/// Builder for [`EncryptedAttribute`].
pub struct AttributeBuilder<T> {
    read: ReadField<T>,
    write: WriteField<T>,
    encryptor: Option<Encryptor>,
    context: Option<ContextResolver<T>>,
}

impl<T: 'static> AttributeBuilder<T> {
    /// Use `provider` for this attribute.
    pub fn provider(mut self, provider: Arc<dyn KekProvider>) -> Self {
        self.encryptor = Some(Encryptor::from_arc(provider));
        self
    }

    /// Use an already configured encryptor (for example one shared by many
    /// attributes, or one that accepts legacy tokens).
    pub fn encryptor(mut self, encryptor: Encryptor) -> Self {
        self.encryptor = Some(encryptor);
        self
    }

    /// Use the same context for every instance.
    pub fn context(self, context: EncryptionContext) -> Self {
        self.context_fn(move |_| Some(context.clone()))
    }

    /// Derive the context from the instance on every read and write.
    pub fn context_fn<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&T) -> Option<EncryptionContext> + Send + Sync + 'static,
    {
        self.context = Some(Arc::new(resolver));
        self
    }

    /// # Errors
    ///
    /// Returns [`Error::NoProvider`] if neither a provider nor an encryptor was given.
    pub fn build(self) -> Result<EncryptedAttribute<T>, Error> {
        let encryptor = self.encryptor.ok_or(Error::NoProvider)?;
        Ok(EncryptedAttribute {
            encryptor,
            context: self.context.unwrap_or_else(|| Arc::new(|_| None)),
            read: self.read,
            write: self.write,
        })
    }
}
