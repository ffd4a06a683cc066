// Proxy endpoints the chat and voice clients call.
// All provider traffic goes through llm_client; handlers only validate and relay.

pub mod handlers;
