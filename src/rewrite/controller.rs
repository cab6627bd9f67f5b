use super::append::AppendAllocator;
use super::driver::MethodRewriteDriver;
use super::prepend::PrependRemapper;
use super::settings::{Settings, SlotStrategy};
use super::slots::{MethodContext, SlotAllocator};
use crate::jvm::{BinaryName, ClassEvent, ClassVisitor, Error, MethodHeader, RenderDescriptor};

/// Class visitor injecting a fresh local into every method body it sees
///
/// Events are forwarded to `next`, with the code of each method going through its own
/// [`MethodRewriteDriver`]. Nothing about one method outlives its `MethodEnd` event.
pub struct ClassRewriteController<V> {
    next: V,
    settings: Settings,

    /// Set by the class header
    class_name: Option<BinaryName>,

    /// Method currently being rewritten
    method: Option<MethodInProgress>,
}

struct MethodInProgress {
    /// Name and descriptor, for error messages and logging
    display_name: String,
    driver: MethodRewriteDriver,
}

impl<V: ClassVisitor> ClassRewriteController<V> {
    pub fn new(next: V, settings: Settings) -> ClassRewriteController<V> {
        ClassRewriteController {
            next,
            settings,
            class_name: None,
            method: None,
        }
    }

    pub fn into_inner(self) -> V {
        self.next
    }

    fn start_method(&self, method: &MethodHeader) -> Result<MethodInProgress, Error> {
        let class_name = self
            .class_name
            .as_ref()
            .ok_or(Error::UnexpectedEvent("method before the class header"))?;
        let context = MethodContext::new(method, class_name.clone());
        let allocator: Box<dyn SlotAllocator> = match self.settings.strategy {
            SlotStrategy::Prepend => Box::new(PrependRemapper::new(
                &context,
                self.settings.frame_policy,
            )),
            SlotStrategy::Append => Box::new(AppendAllocator::new()),
        };
        Ok(MethodInProgress {
            display_name: format!("{}{}", method.name, method.descriptor.render()),
            driver: MethodRewriteDriver::new(allocator),
        })
    }
}

impl<V: ClassVisitor> ClassVisitor for ClassRewriteController<V> {
    fn visit(&mut self, event: ClassEvent) -> Result<(), Error> {
        match event {
            ClassEvent::Header(header) => {
                self.class_name = Some(header.name.clone());
                self.next.visit(ClassEvent::Header(header))
            }
            ClassEvent::Method(method) => {
                if self.method.is_some() {
                    return Err(Error::UnexpectedEvent("method inside of a method"));
                }
                self.method = Some(self.start_method(&method)?);
                self.next.visit(ClassEvent::Method(method))
            }
            ClassEvent::Code(code) => {
                let method = self
                    .method
                    .as_mut()
                    .ok_or(Error::UnexpectedEvent("code outside of a method"))?;
                method
                    .driver
                    .visit_code(code, &mut self.next)
                    .map_err(|error| Error::InMethod {
                        method: method.display_name.clone(),
                        error: Box::new(error),
                    })
            }
            ClassEvent::MethodEnd => {
                let method = self
                    .method
                    .take()
                    .ok_or(Error::UnexpectedEvent("end of a method that never started"))?;
                match method.driver.sentinel_slot() {
                    Some(slot) => log::debug!(
                        "Rewrote {} (injected local in slot {})",
                        method.display_name,
                        slot
                    ),
                    None => log::debug!("Skipping {} (no code)", method.display_name),
                }
                self.next.visit(ClassEvent::MethodEnd)
            }
            other => self.next.visit(other),
        }
    }
}
